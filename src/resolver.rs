//! Title resolution: external collaborator interface.
//!
//! Resolving a free-text query against a metadata catalog is out of
//! scope for this crate; implementations live with the embedding
//! application. What does live here is the query-parsing convention the
//! rest of the system relies on: a trailing year in the query selects a
//! specific release.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::models::ContentIdentity;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no title matched query '{0}'")]
    NotFound(String),

    #[error("query '{0}' matched multiple titles with no clear winner")]
    Ambiguous(String),

    #[error("catalog lookup failed: {0}")]
    Upstream(String),
}

/// Resolves a free-text title query to a canonical content identity.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<ContentIdentity, ResolveError>;
}

/// Trailing `1999`, `(1999)`, or `(1999` at the end of a query.
static YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\b((?:19|20)\d{2})\b\)?\s*$").unwrap());

/// Split a free-text query into title and optional release year.
///
/// `"The Matrix (1999)"` and `"The Matrix 1999"` both yield
/// `("The Matrix", Some(1999))`. A year embedded mid-title (`"2001: A
/// Space Odyssey"`) is part of the title, not a release year.
pub fn parse_title_query(query: &str) -> (String, Option<u16>) {
    if let Some(found) = YEAR_SUFFIX.captures(query) {
        let year = found
            .get(1)
            .and_then(|m| m.as_str().parse::<u16>().ok());
        let full = found.get(0).map(|m| m.start()).unwrap_or(query.len());
        let title = query[..full].trim();
        if !title.is_empty() {
            return (title.to_string(), year);
        }
    }
    (query.trim().to_string(), None)
}
