//! Advisory-text scraping: external collaborator interface.
//!
//! Fetching and HTML-extracting the crowd-sourced advisory page is out
//! of scope here, including its retry and anti-bot fallback policy. A
//! scraper that cannot obtain real text is expected to return a degraded
//! placeholder (`is_degraded = true`) rather than fail the category.
//!
//! The text-cleanup convention scraped text is expected to follow lives
//! here so every implementation truncates and normalizes the same way.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::models::{Category, CategoryRawText, ContentIdentity};

/// Default ceiling on cleaned advisory text, in characters. Advisory
/// pages can run very long; anything past this adds token cost without
/// changing the assessment.
pub const DEFAULT_MAX_TEXT_LEN: usize = 2000;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("source page for '{0}' has no usable advisory section")]
    EmptySection(String),

    #[error("fetch failed: {0}")]
    Upstream(String),
}

/// Fetches raw advisory text for one category of one title.
#[async_trait]
pub trait GuideScraper: Send + Sync {
    async fn fetch(
        &self,
        identity: &ContentIdentity,
        category: Category,
    ) -> Result<CategoryRawText, ScrapeError>;
}

/// Residual HTML entities left behind by markup stripping.
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[a-z]+;").unwrap());

/// Strip residual entities, collapse whitespace runs, and truncate to
/// `max_len` characters (on a char boundary, with a trailing ellipsis).
pub fn clean_advisory_text(text: &str, max_len: usize) -> String {
    let stripped = HTML_ENTITY.replace_all(text, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_len {
        return collapsed;
    }
    let cut = collapsed
        .char_indices()
        .nth(max_len)
        .map(|(i, _)| i)
        .unwrap_or(collapsed.len());
    format!("{}...", &collapsed[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_stripped_and_whitespace_collapsed() {
        let raw = "A man&nbsp;is&amp;punched.\n\n   Repeatedly.";
        assert_eq!(
            clean_advisory_text(raw, 100),
            "A man is punched. Repeatedly."
        );
    }

    #[test]
    fn short_text_not_truncated() {
        assert_eq!(clean_advisory_text("short", 100), "short");
    }

    #[test]
    fn long_text_truncated_with_ellipsis() {
        let raw = "word ".repeat(100);
        let cleaned = clean_advisory_text(&raw, 20);
        assert!(cleaned.ends_with("..."));
        assert!(cleaned.chars().count() <= 23);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let raw = "é".repeat(50);
        let cleaned = clean_advisory_text(&raw, 10);
        assert!(cleaned.ends_with("..."));
        assert_eq!(cleaned.chars().count(), 13);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_advisory_text("", 100), "");
        assert_eq!(clean_advisory_text("   \n  ", 100), "");
    }
}
