use std::sync::Arc;
use std::time::Instant;

use axum::{http::StatusCode, response::Response};
use tracing::{error, info};

use super::AppState;
use super::dispatch::PathParams;
use super::response::{ApiError, RequestContext, html_page, html_page_with_status};
use super::templates::{self, SITE_TITLE};

const ADMIN_TITLE: &str = "SongBook Admin Page";

/// Operational commands reachable under `/admin/:section/:command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    /// Clears the song cache and rebuilds the search index.
    ResetIndex,
    /// Replaces the administrator key.
    RotateKey,
}

impl AdminCommand {
    #[must_use]
    pub fn parse(section: &str, command: &str) -> Option<Self> {
        match (section, command) {
            ("index", "reset") => Some(Self::ResetIndex),
            ("keys", "rotate") => Some(Self::RotateKey),
            _ => None,
        }
    }
}

pub async fn admin(state: &Arc<AppState>, ctx: &RequestContext) -> Result<Response, ApiError> {
    Ok(html_page(state, ctx, ADMIN_TITLE, &templates::admin()))
}

pub async fn admin_command(
    state: &Arc<AppState>,
    ctx: &RequestContext,
    params: &PathParams,
) -> Result<Response, ApiError> {
    let section = params.get("section").unwrap_or_default();
    let command = params.get("command").unwrap_or_default();
    let title = format!("Administration - {SITE_TITLE}");

    let (status, alert) = match AdminCommand::parse(section, command) {
        Some(AdminCommand::ResetIndex) => reset_index(state).await,
        Some(AdminCommand::RotateKey) => match state.keys.rotate_administrator_key() {
            Ok(_) => (
                StatusCode::OK,
                templates::alert("success", "A new administrator key was created"),
            ),
            Err(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::alert("danger", "The administrator key could not be written"),
            ),
        },
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            templates::alert("danger", &format!("Command '{section}/{command}' not supported")),
        ),
    };

    let body = format!("{alert}{}", templates::admin());
    Ok(html_page_with_status(state, ctx, status, &title, &body))
}

async fn reset_index(state: &Arc<AppState>) -> (StatusCode, String) {
    let start = Instant::now();
    let worker = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || worker.catalog.reindex()).await;

    match result {
        Ok(Ok(count)) => {
            info!(
                "Reindexed {count} songs in {}ms",
                start.elapsed().as_millis()
            );
            (
                StatusCode::OK,
                templates::alert("success", &format!("Songs reindexed ({count} songs)")),
            )
        }
        Ok(Err(e)) => {
            error!("Can't rebuild index: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::alert("danger", "An error occurred while indexing songs"),
            )
        }
        Err(e) => {
            error!("Reindex task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                templates::alert("danger", "An error occurred while indexing songs"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(AdminCommand::parse("index", "reset"), Some(AdminCommand::ResetIndex));
        assert_eq!(AdminCommand::parse("keys", "rotate"), Some(AdminCommand::RotateKey));
        assert_eq!(AdminCommand::parse("index", "drop"), None);
        assert_eq!(AdminCommand::parse("users", "reset"), None);
    }
}
