use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{
    HeaderValue,
    header::{ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY},
};
use axum::middleware::{self, Next};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use super::admin;
use super::dispatch::{Access, Handler, RouteTable, songbook_routes};
use super::handlers;
use super::response::{ApiError, RequestContext, render_error};
use crate::auth::{KeyRing, Session, require_session};
use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::store::FileSongStore;

const MAX_SONG_BYTES: usize = 1024 * 1024;

/// Everything a handler may touch. Built once at startup and shared.
pub struct AppState {
    pub catalog: Catalog,
    pub keys: KeyRing,
    /// Directory static assets are served from.
    pub web_root: PathBuf,
    pub routes: RouteTable,
}

impl AppState {
    #[must_use]
    pub fn new(catalog: Catalog, keys: KeyRing, web_root: PathBuf) -> Self {
        Self {
            catalog,
            keys,
            web_root,
            routes: songbook_routes(),
        }
    }

    /// Loads keys, opens the song store and builds the search index.
    pub fn open(config: &ServerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let keys = KeyRing::load(&config.data_dir);
        let store = FileSongStore::new(config.songs_dir())?;
        let catalog = Catalog::open(Arc::new(store))?;
        Ok(Self::new(catalog, keys, config.web_root.clone()))
    }
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

async fn reflect_origin(request: Request, next: Next) -> Response {
    let origin = request.headers().get(ORIGIN).cloned();

    let mut response = next.run(request).await;

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
    response
}

async fn read_song_body(request: Request) -> std::result::Result<String, ApiError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_SONG_BYTES)
        .await
        .map_err(|_| ApiError::bad_request("Song is too large"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| ApiError::bad_request("Song must be UTF-8 text"))
}

async fn serve_static(state: &AppState, request: Request) -> Response {
    match ServeDir::new(&state.web_root).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .unwrap_or_else(|| Session {
            key: None,
            role: state.keys.role(None),
        });
    let ctx = RequestContext::new(&request, &session);

    let matched = match state.routes.resolve(request.method(), request.uri().path()) {
        Ok(matched) => matched,
        Err(e) => return render_error(&state, &ctx, e.into()),
    };

    if matched.route.access == Access::Administrator && !session.role.is_administrator() {
        return render_error(&state, &ctx, Error::Unauthorized.into());
    }

    let params = matched.params;
    let result = match matched.route.handler {
        Handler::Health => Ok(handlers::health().await),
        Handler::StaticFile => return serve_static(&state, request).await,
        Handler::Search => handlers::search(&state, &ctx, &params).await,
        Handler::ViewSong => handlers::view_song(&state, &ctx, &params).await,
        Handler::NewSong => handlers::new_song(&state, &ctx).await,
        Handler::EditSong => handlers::edit_song(&state, &ctx, &params).await,
        Handler::DeleteSongPage | Handler::DeleteSong => {
            handlers::delete_song(&state, &ctx, &params).await
        }
        Handler::CreateSong => match read_song_body(request).await {
            Ok(content) => handlers::create_song(&state, &ctx, content).await,
            Err(e) => Err(e),
        },
        Handler::UpdateSong => match read_song_body(request).await {
            Ok(content) => handlers::update_song(&state, &ctx, &params, content).await,
            Err(e) => Err(e),
        },
        Handler::Admin => admin::admin(&state, &ctx).await,
        Handler::AdminCommand => admin::admin_command(&state, &ctx, &params).await,
        Handler::SignIn => handlers::signin(&state, &ctx).await,
        Handler::ConsoleApi => handlers::console_api(&state, &ctx).await,
    };

    result.unwrap_or_else(|e| render_error(&state, &ctx, e))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ))
        .layer(middleware::from_fn(reflect_origin))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

