use std::sync::Arc;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::AppState;
use super::dispatch::PathParams;
use super::negotiate::Representation;
use super::response::{ApiError, ApiResponse, RequestContext, html_page, text};
use super::templates::{self, SITE_TITLE};
use crate::song::{Song, new_song_template, render_html};

#[derive(Debug, Serialize)]
struct SongResponse<'a> {
    id: &'a str,
    title: &'a str,
    artist: &'a str,
    album: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct IdResponse<'a> {
    id: &'a str,
}

fn id_param(params: &PathParams) -> Result<&str, ApiError> {
    params
        .get("id")
        .ok_or_else(|| ApiError::bad_request("Missing song id"))
}

fn id_response(ctx: &RequestContext, id: &str) -> Response {
    match ctx.representation {
        Representation::Json => Json(ApiResponse::success(IdResponse { id })).into_response(),
        _ => text(Representation::Plain, id),
    }
}

pub async fn health() -> Response {
    "OK".into_response()
}

pub async fn search(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
) -> Result<Response, ApiError> {
    let query = params
        .get("query")
        .or_else(|| ctx.param("query"))
        .filter(|q| !q.trim().is_empty());

    let hits = state.catalog.search(query)?;

    let response = match ctx.representation {
        Representation::Html => {
            let title = match query {
                Some(query) => format!("{query} - {SITE_TITLE}"),
                None => SITE_TITLE.to_string(),
            };
            html_page(state, ctx, &title, &templates::search_results(&hits))
        }
        Representation::Json => Json(ApiResponse::success(hits)).into_response(),
        representation => text(representation, templates::search_listing(&hits)),
    };
    Ok(response)
}

pub async fn view_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
) -> Result<Response, ApiError> {
    let id = id_param(params)?;
    let content = state.catalog.fetch(id)?;

    let response = match ctx.representation {
        Representation::Html => {
            let song = Song::parse(&content);
            let title = format!("{} - {SITE_TITLE}", song.title);
            let body = templates::view_song(id, &render_html(&song), ctx.role);
            html_page(state, ctx, &title, &body)
        }
        Representation::Json => {
            let song = Song::parse(&content);
            Json(ApiResponse::success(SongResponse {
                id,
                title: &song.title,
                artist: &song.artist,
                album: &song.album,
                content: &content,
            }))
            .into_response()
        }
        representation => text(representation, content),
    };

    tracing::info!("Serve song {id}");
    Ok(response)
}

pub async fn new_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
) -> Result<Response, ApiError> {
    let body = templates::edit_song("", new_song_template());
    Ok(html_page(
        state,
        ctx,
        &format!("Create Song - {SITE_TITLE}"),
        &body,
    ))
}

pub async fn edit_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
) -> Result<Response, ApiError> {
    let id = id_param(params)?;
    let content = state.catalog.fetch(id)?;
    let song = Song::parse(&content);

    let title = format!("Edit - {} - {SITE_TITLE}", song.title);
    Ok(html_page(
        state,
        ctx,
        &title,
        &templates::edit_song(id, &content),
    ))
}

pub async fn create_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    content: String,
) -> Result<Response, ApiError> {
    let id = state.catalog.create(&content)?;
    Ok(id_response(ctx, &id))
}

pub async fn update_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
    content: String,
) -> Result<Response, ApiError> {
    let id = id_param(params)?;
    let id = state.catalog.update(id, &content).map_err(|e| {
        ApiError::for_mutation(e, "The song doesn't exist and cannot be updated")
    })?;
    Ok(id_response(ctx, &id))
}

pub async fn delete_song(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
) -> Result<Response, ApiError> {
    let id = id_param(params)?;
    let deleted = state.catalog.delete(id).map_err(|e| {
        ApiError::for_mutation(e, "The song doesn't exist and cannot be deleted")
    })?;

    match ctx.representation {
        Representation::Html => {
            let hits = state.catalog.search(None).unwrap_or_else(|e| {
                tracing::error!("Song {} deleted but listing failed: {e}", deleted.id);
                Vec::new()
            });
            let body = format!(
                "{}{}",
                templates::alert(
                    "success",
                    &format!("Song '{}' removed successfully", deleted.title)
                ),
                templates::search_results(&hits)
            );
            Ok(html_page(state, ctx, SITE_TITLE, &body))
        }
        _ => Ok(id_response(ctx, &deleted.id)),
    }
}

pub async fn signin(state: &Arc<AppState>, ctx: &RequestContext) -> Result<Response, ApiError> {
    Ok(html_page(
        state,
        ctx,
        "SongBook Sign In",
        &templates::signin(),
    ))
}

pub async fn console_api(
    state: &Arc<AppState>,
    ctx: &RequestContext,
) -> Result<Response, ApiError> {
    Ok(html_page(
        state,
        ctx,
        "Song Console Api",
        &templates::console_api(),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::StatusCode;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::{KeyRing, Role};
    use crate::catalog::Catalog;
    use crate::error::Error;
    use crate::index::SearchIndex;
    use crate::server::dispatch::PathTemplate;
    use crate::store::FileSongStore;

    fn state(temp_dir: &TempDir) -> Arc<AppState> {
        let store = FileSongStore::new(temp_dir.path().join("songs")).unwrap();
        let catalog = Catalog::new(Arc::new(store), SearchIndex::new().unwrap());
        let keys = KeyRing::new(temp_dir.path(), Some("A".to_string()), None);
        Arc::new(AppState::new(catalog, keys, temp_dir.path().join("web")))
    }

    fn context(path: &str, representation: Representation) -> RequestContext {
        RequestContext {
            path: path.to_string(),
            query: HashMap::new(),
            representation,
            role: Role::Administrator,
        }
    }

    #[tokio::test]
    async fn test_delete_page_survives_listing_failure() {
        let temp_dir = TempDir::new().unwrap();
        let state = state(&temp_dir);
        let id = state
            .catalog
            .create("{title: Imagine}\n{artist: Lennon}\n...\n")
            .unwrap();
        state.catalog.index().fail_queries(true);

        let ctx = context(&format!("/delete/{id}"), Representation::Html);
        let params = PathTemplate::parse("/delete/:id").matches(&ctx.path).unwrap();
        let response = delete_song(&state, &ctx, &params).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("removed successfully"));
        assert!(matches!(state.catalog.fetch(&id), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let state = state(&temp_dir);
        state.catalog.index().fail_queries(true);

        let ctx = context("/", Representation::Plain);
        let error = search(&state, &ctx, &PathParams::default())
            .await
            .err()
            .unwrap();

        assert_eq!(error.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
