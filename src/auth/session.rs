use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, Uri, header::SET_COOKIE};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar};

use super::Role;
use crate::error::Error;
use crate::server::AppState;
use crate::server::response::{RequestContext, render_error};

pub const SESSION_COOKIE: &str = "SessionKey";
const KEY_PARAM: &str = "key";

/// Key and role resolved for the current request.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: Option<String>,
    pub role: Role,
}

/// Resolves the session key from the `SessionKey` cookie and the `key`
/// query parameter. Returns the key and whether the cookie must be
/// refreshed because the parameter overrode it.
#[must_use]
pub fn resolve_session_key(headers: &HeaderMap, uri: &Uri) -> (Option<String>, bool) {
    let jar = CookieJar::from_headers(headers);
    let cookie_key = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let param_key = Query::<HashMap<String, String>>::try_from_uri(uri)
        .ok()
        .and_then(|Query(mut params)| params.remove(KEY_PARAM))
        .filter(|key| !key.is_empty());

    match param_key {
        Some(key) if cookie_key.as_deref() != Some(key.as_str()) => (Some(key), true),
        _ => (cookie_key, false),
    }
}

fn session_cookie(key: &str) -> Option<HeaderValue> {
    let cookie = Cookie::build((SESSION_COOKIE, key.to_string()))
        .path("/")
        .permanent()
        .build();
    HeaderValue::from_str(&cookie.to_string()).ok()
}

/// Resolves the session, rejects keys that fail the user check, and makes
/// the [`Session`] available to the dispatcher. The administrator key gets
/// no exemption here: with a user key configured, only that key passes.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (key, refresh_cookie) = resolve_session_key(request.headers(), request.uri());
    let role = state.keys.role(key.as_deref());

    if !state.keys.is_user(key.as_deref()) {
        let session = Session { key, role };
        let ctx = RequestContext::new(&request, &session);
        return render_error(&state, &ctx, Error::Unauthorized.into());
    }

    if role.is_administrator() {
        state.keys.activate();
    }

    let cookie = if refresh_cookie {
        key.as_deref().and_then(session_cookie)
    } else {
        None
    };

    request.extensions_mut().insert(Session { key, role });
    let mut response = next.run(request).await;

    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
