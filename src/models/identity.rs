use serde::{Deserialize, Serialize};

/// Whether an identity names a film or an episodic series.
///
/// The kind never participates in cache-key derivation: a film and a
/// series with the same normalized title and year share one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

/// A resolved, canonical content identity: the output of the external
/// title resolver and the unit the cache is keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentIdentity {
    pub title: String,
    /// Release year; `None` means unknown and renders as the `unknown`
    /// sentinel in the derived key.
    pub year: Option<u16>,
    pub kind: MediaKind,
}

impl ContentIdentity {
    pub fn new(title: impl Into<String>, year: Option<u16>, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            year,
            kind,
        }
    }

    /// Whether the identity can enter the pipeline: non-empty title and,
    /// when present, a 4-digit year.
    pub fn is_well_formed(&self) -> bool {
        !self.title.trim().is_empty()
            && self.year.map_or(true, |y| (1000..=9999).contains(&y))
    }

    /// Derive the canonical cache key.
    ///
    /// The algorithm is part of the stored-data contract and must stay
    /// stable across releases: lowercase the title, strip surrounding
    /// whitespace, collapse internal whitespace runs to single spaces,
    /// then join as `media:<title>_<year>`.
    pub fn derive_key(&self) -> String {
        let normalized = self
            .title
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        match self.year {
            Some(year) => format!("media:{normalized}_{year}"),
            None => format!("media:{normalized}_unknown"),
        }
    }
}
