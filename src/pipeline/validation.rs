//! Post-decode validation of model payloads.
//!
//! Applied between the stream decoder and result construction. A decoded
//! object either becomes an immutable [`CategoryResult`] /
//! [`OverallVerdict`] or is rejected with a reason; nothing half-valid
//! passes through.

use serde::Deserialize;

use super::ExtractionError;
use crate::models::{Category, CategoryResult, OverallVerdict, Severity};

/// Wire shape of a category payload as the model emits it.
#[derive(Deserialize)]
struct RawCategoryPayload {
    #[serde(default)]
    level: Option<String>,
    score: i64,
    #[serde(default)]
    quotes: Vec<String>,
    summary: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Wire shape of a verdict payload.
#[derive(Deserialize)]
struct RawVerdictPayload {
    recommendation: String,
    rationale: String,
    #[serde(default)]
    context_tags: Vec<String>,
}

/// Default confidence when the model omits the field.
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Validate a decoded category object into a [`CategoryResult`].
///
/// Rules:
/// - `score`, `quotes`, `summary` are required fields; `score` must be in
///   `[1, 10]` and `summary` non-empty.
/// - `quotes` may be empty only when the input was degraded.
/// - `confidence` is clamped to `[0, 1]` and, for degraded input, capped
///   at `degraded_confidence_cap`.
/// - An unrecognized `level` collapses to [`Severity::Unknown`].
pub fn validate_category_payload(
    category: Category,
    value: &serde_json::Value,
    is_degraded: bool,
    degraded_confidence_cap: f32,
) -> Result<CategoryResult, ExtractionError> {
    let raw: RawCategoryPayload = serde_json::from_value(value.clone())
        .map_err(|e| ExtractionError::InvalidPayload(format!("{category}: {e}")))?;

    if !(1..=10).contains(&raw.score) {
        return Err(ExtractionError::InvalidPayload(format!(
            "{category}: score {} outside [1, 10]",
            raw.score
        )));
    }
    if raw.summary.trim().is_empty() {
        return Err(ExtractionError::InvalidPayload(format!(
            "{category}: empty summary"
        )));
    }
    if raw.quotes.is_empty() && !is_degraded {
        return Err(ExtractionError::InvalidPayload(format!(
            "{category}: no supporting quotes for non-degraded input"
        )));
    }

    let mut confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
    if is_degraded {
        confidence = confidence.min(degraded_confidence_cap);
    }

    Ok(CategoryResult {
        category,
        level: Severity::parse_lenient(raw.level.as_deref()),
        score: raw.score as u8,
        quotes: raw.quotes,
        summary: raw.summary,
        confidence,
    })
}

/// Validate a decoded verdict object into an [`OverallVerdict`].
pub fn validate_verdict_payload(
    value: &serde_json::Value,
) -> Result<OverallVerdict, ExtractionError> {
    let raw: RawVerdictPayload = serde_json::from_value(value.clone())
        .map_err(|e| ExtractionError::InvalidPayload(format!("verdict: {e}")))?;

    if raw.recommendation.trim().is_empty() {
        return Err(ExtractionError::InvalidPayload(
            "verdict: empty recommendation".into(),
        ));
    }
    if raw.rationale.trim().is_empty() {
        return Err(ExtractionError::InvalidPayload(
            "verdict: empty rationale".into(),
        ));
    }

    Ok(OverallVerdict {
        recommendation: raw.recommendation,
        rationale: raw.rationale,
        context_tags: raw.context_tags,
    })
}
