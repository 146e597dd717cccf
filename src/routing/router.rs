//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Compute the path forwarded to the destination
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use axum::http::Uri;

use crate::config::RouteConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    /// Normalized prefix, without a trailing slash ("" for the root route).
    pub prefix: String,
    pub cluster: String,
}

impl Route {
    fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Path and query to send to the destination: the prefix is removed,
    /// the remainder is kept unchanged.
    pub fn forward_path(&self, uri: &Uri) -> String {
        let rest = uri.path().strip_prefix(self.prefix.as_str()).unwrap_or(uri.path());
        let path = if rest.is_empty() { "/" } else { rest };
        match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        }
    }
}

/// Immutable route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs
            .iter()
            .map(|c| Route {
                name: c.name.clone(),
                prefix: c.path_prefix.trim_end_matches('/').to_string(),
                cluster: c.cluster.clone(),
            })
            .collect();
        // Stable sort keeps configuration order among equal lengths.
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    /// Find the route with the longest prefix matching `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(path))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}
