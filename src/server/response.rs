use std::collections::HashMap;

use axum::{
    Json,
    extract::Query,
    http::{HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use super::AppState;
use super::negotiate::Representation;
use super::templates;
use crate::auth::{Role, Session};
use crate::error::Error;

/// Standard JSON response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// Error a handler returns; turned into a response by [`render_error`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Maps errors of update and delete requests, where an unknown song is
    /// the client's mistake rather than a missing page.
    #[must_use]
    pub fn for_mutation(error: Error, not_found_message: &str) -> Self {
        match error {
            Error::NotFound(_) | Error::InvalidId(_) => Self::bad_request(not_found_message),
            other => other.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        match error {
            Error::Validation(message) => Self::bad_request(message),
            Error::NotFound(id) | Error::InvalidId(id) => {
                Self::not_found(format!("Song '{id}' not found"))
            }
            Error::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, "Unauthorized"),
            Error::MethodNotAllowed => {
                Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
            Error::IndexQuery(message) => Self::internal(format!("Invalid query: {message}")),
            Error::Storage(_) | Error::Index(_) | Error::Config(_) => {
                Self::internal("Internal server error")
            }
        }
    }
}

/// What handlers need to know about the request beyond its route.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub path: String,
    pub query: HashMap<String, String>,
    pub representation: Representation,
    pub role: Role,
}

impl RequestContext {
    pub fn new<B>(request: &Request<B>, session: &Session) -> Self {
        let accept = request
            .headers()
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok());
        let query = Query::<HashMap<String, String>>::try_from_uri(request.uri())
            .map(|Query(params)| params)
            .unwrap_or_default();

        Self {
            path: request.uri().path().to_string(),
            query,
            representation: Representation::negotiate(accept),
            role: session.role,
        }
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Wraps `body` in the page chrome for the request's role, adding the
/// first-run alert while it is armed.
#[must_use]
pub fn html_page(state: &AppState, ctx: &RequestContext, title: &str, body: &str) -> Response {
    html_page_with_status(state, ctx, StatusCode::OK, title, body)
}

#[must_use]
pub fn html_page_with_status(
    state: &AppState,
    ctx: &RequestContext,
    status: StatusCode,
    title: &str,
    body: &str,
) -> Response {
    let alert_key = state.keys.pending_alert();
    let html = templates::page(title, ctx.role, alert_key.as_deref(), &ctx.path, body);
    (status, typed(Representation::Html), html).into_response()
}

/// A text response labelled with the representation's content type.
#[must_use]
pub fn text(representation: Representation, body: impl Into<String>) -> Response {
    (typed(representation), body.into()).into_response()
}

fn typed(representation: Representation) -> [(header::HeaderName, HeaderValue); 1] {
    let mime = match representation {
        Representation::Html => "text/html; charset=utf-8",
        Representation::Plain => "text/plain; charset=utf-8",
        Representation::Song => "text/song; charset=utf-8",
        Representation::Json => "application/json",
    };
    [(header::CONTENT_TYPE, HeaderValue::from_static(mime))]
}

/// Single translation step from an error to the response the client sees.
#[must_use]
pub fn render_error(state: &AppState, ctx: &RequestContext, error: ApiError) -> Response {
    match ctx.representation {
        Representation::Html => {
            let title = format!(
                "{} - {}",
                error.status.canonical_reason().unwrap_or("Error"),
                templates::SITE_TITLE
            );
            let body = templates::alert("danger", &error.message);
            html_page_with_status(state, ctx, error.status, &title, &body)
        }
        Representation::Json => {
            let body = json!({ "data": null, "error": error.message });
            (error.status, Json(body)).into_response()
        }
        Representation::Plain | Representation::Song => {
            (error.status, text(Representation::Plain, error.message)).into_response()
        }
    }
}
