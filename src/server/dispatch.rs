//! Ordered route table.
//!
//! Routes are matched by template in registration order. The first template
//! that matches the path decides: the row registered for that template with
//! the request's method handles it, and if there is no such row the request
//! fails with `MethodNotAllowed`, even when a later template would also have
//! matched. Paths no template matches go to the wildcard route.

use std::collections::HashMap;

use axum::http::Method;

use crate::error::{Error, Result};

/// Tag naming the handler a route dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Health,
    Search,
    ViewSong,
    NewSong,
    EditSong,
    DeleteSongPage,
    CreateSong,
    UpdateSong,
    DeleteSong,
    Admin,
    AdminCommand,
    SignIn,
    ConsoleApi,
    StaticFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Administrator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

impl PathTemplate {
    /// Parses a template such as `/songs/:id`. A lone `*` is the wildcard.
    #[must_use]
    pub fn parse(template: &str) -> Self {
        if template == "*" {
            return Self {
                raw: template.to_string(),
                segments: Vec::new(),
                wildcard: true,
            };
        }

        let segments = split_path(template)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self {
            raw: template.to_string(),
            segments,
            wildcard: false,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Matches `path`, returning the decoded parameters on success.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        if self.wildcard {
            return Some(PathParams::default());
        }

        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    let value = urlencoding::decode(part)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| part.to_string());
                    if value.is_empty() {
                        return None;
                    }
                    params.0.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }

    /// Templates are the same when they match the same paths.
    fn same_as(&self, other: &PathTemplate) -> bool {
        self.wildcard == other.wildcard && self.segments == other.segments
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Decoded path parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub template: PathTemplate,
    pub handler: Handler,
    pub access: Access,
}

#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: PathParams,
}

/// Immutable once built; resolving takes `&self` only.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, method: Method, template: &str, handler: Handler, access: Access) -> Self {
        self.routes.push(Route {
            method,
            template: PathTemplate::parse(template),
            handler,
            access,
        });
        self
    }

    #[must_use]
    pub fn public(self, method: Method, template: &str, handler: Handler) -> Self {
        self.route(method, template, handler, Access::Public)
    }

    #[must_use]
    pub fn admin(self, method: Method, template: &str, handler: Handler) -> Self {
        self.route(method, template, handler, Access::Administrator)
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>> {
        let concrete = self.routes.iter().filter(|r| !r.template.is_wildcard());
        let wildcard = self.routes.iter().filter(|r| r.template.is_wildcard());

        for candidate in concrete.chain(wildcard) {
            let Some(params) = candidate.template.matches(path) else {
                continue;
            };

            let route = self
                .routes
                .iter()
                .filter(|r| r.template.same_as(&candidate.template))
                .find(|r| r.method == *method)
                .ok_or(Error::MethodNotAllowed)?;

            return Ok(RouteMatch { route, params });
        }

        Err(Error::NotFound(path.to_string()))
    }
}

/// The songbook's route table.
#[must_use]
pub fn songbook_routes() -> RouteTable {
    RouteTable::new()
        .public(Method::GET, "/health", Handler::Health)
        .public(Method::GET, "/", Handler::Search)
        .public(Method::GET, "/view/:id", Handler::ViewSong)
        .admin(Method::GET, "/edit/:id", Handler::EditSong)
        .admin(Method::GET, "/delete/:id", Handler::DeleteSongPage)
        .admin(Method::GET, "/new", Handler::NewSong)
        .public(Method::GET, "/search/:query", Handler::Search)
        .public(Method::GET, "/search", Handler::Search)
        .admin(Method::POST, "/songs", Handler::CreateSong)
        .public(Method::GET, "/songs/:id", Handler::ViewSong)
        .admin(Method::PUT, "/songs/:id", Handler::UpdateSong)
        .admin(Method::DELETE, "/songs/:id", Handler::DeleteSong)
        .public(Method::GET, "/consoleApi", Handler::ConsoleApi)
        .public(Method::GET, "/signin", Handler::SignIn)
        .admin(Method::GET, "/admin/:section/:command", Handler::AdminCommand)
        .admin(Method::GET, "/admin", Handler::Admin)
        .public(Method::GET, "*", Handler::StaticFile)
}
