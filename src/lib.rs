//! # Songbook
//!
//! A song catalog server, usable both as a standalone binary and as a library.
//!
//! Songs are stored as text files and indexed in memory for full-text search.
//! Anyone holding the user key (or anyone at all when no user key is set) can
//! search and read; only the administrator key can create, edit and delete.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! songbook = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use songbook::config::ServerConfig;
//! use songbook::server::{AppState, create_router};
//!
//! let state = Arc::new(AppState::open(&ServerConfig::default())?);
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `songbook` binary. Disable with `default-features = false`.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod server;
pub mod song;
pub mod store;
