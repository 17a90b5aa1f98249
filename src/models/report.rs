use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::identity::ContentIdentity;

/// Advisory band reported alongside the numeric score.
///
/// `Unknown` is the forced value when the source text was missing or
/// meaningless; the model is instructed never to guess a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
    Unknown,
}

impl Severity {
    /// Lenient parse of a model-emitted band string. Unrecognized or
    /// missing bands collapse to `Unknown` rather than failing the
    /// extraction.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("none") => Self::None,
            Some("mild") => Self::Mild,
            Some("moderate") => Self::Moderate,
            Some("severe") => Self::Severe,
            _ => Self::Unknown,
        }
    }
}

/// Validated result of one category extraction. Built exactly once per
/// cache-miss run and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: Category,
    pub level: Severity,
    /// Intensity score from 1 (nothing of note) to 10 (extreme).
    pub score: u8,
    /// Verbatim excerpts from the source text supporting the score.
    /// May be empty only when the input was degraded.
    pub quotes: Vec<String>,
    pub summary: String,
    /// Model's self-assessed confidence in [0, 1]. Capped when the input
    /// was a degraded placeholder.
    pub confidence: f32,
}

/// The synthesized overall verdict, produced after all four categories
/// resolve from whichever of them succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallVerdict {
    pub recommendation: String,
    pub rationale: String,
    /// Short badge phrases for a UI (e.g. "graphic violence").
    #[serde(default)]
    pub context_tags: Vec<String>,
}

/// Why a single category's extraction failed. Terminal for that category
/// only; sibling categories are unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    BackendUnavailable,
    MalformedOutput,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub category: Category,
    pub kind: FailureKind,
    pub detail: String,
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed ({:?}): {}", self.category, self.kind, self.detail)
    }
}

/// A content report: the canonical stored value of the cache and the
/// in-flight accumulator of a recomputation run.
///
/// Persisted reports are only ever replaced whole; a stored report is
/// never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub identity: ContentIdentity,
    pub categories: BTreeMap<Category, CategoryResult>,
    pub verdict: Option<OverallVerdict>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn new(identity: ContentIdentity) -> Self {
        Self {
            identity,
            categories: BTreeMap::new(),
            verdict: None,
            generated_at: Utc::now(),
        }
    }

    /// All four categories present and a verdict attached.
    pub fn is_complete(&self) -> bool {
        self.verdict.is_some() && self.categories.len() == Category::ALL.len()
    }

    /// At least one category resolved: the threshold for persisting.
    pub fn is_usable(&self) -> bool {
        !self.categories.is_empty()
    }
}

/// Terminal pipeline-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineFailure {
    /// Every category failed; nothing was persisted.
    AllCategoriesFailed { failures: Vec<ExtractionFailure> },
    /// At least one category succeeded but the synthesis call failed.
    /// The successful category fragments were already delivered.
    SynthesisFailed { detail: String },
}

impl std::fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllCategoriesFailed { failures } => {
                write!(f, "all {} categories failed", failures.len())
            }
            Self::SynthesisFailed { detail } => {
                write!(f, "verdict synthesis failed: {detail}")
            }
        }
    }
}

/// One discrete unit pushed to the caller as the pipeline progresses.
///
/// The transport layer serializes each fragment as it arrives and closes
/// the stream after a terminal fragment (`Verdict`, `CachedReport`, or
/// `PipelineFailed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportFragment {
    /// Interim snapshot for one category, superseded by a later fragment
    /// for the same category. Transports may ignore these.
    CategoryProgress {
        category: Category,
        partial: CategoryResult,
    },
    /// Terminal success for one category.
    CategoryDone {
        category: Category,
        result: CategoryResult,
    },
    /// Terminal failure for one category; siblings continue.
    CategoryFailed {
        category: Category,
        failure: ExtractionFailure,
    },
    /// The synthesized overall verdict.
    Verdict { verdict: OverallVerdict },
    /// A cache hit, replayed whole (no partial-card delivery on hits).
    CachedReport { report: Report },
    /// Terminal pipeline-level failure.
    PipelineFailed { failure: PipelineFailure },
}

impl ReportFragment {
    /// Whether this fragment ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Verdict { .. } | Self::CachedReport { .. } | Self::PipelineFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::MediaKind;

    fn make_result(category: Category, score: u8) -> CategoryResult {
        CategoryResult {
            category,
            level: Severity::Moderate,
            score,
            quotes: vec!["a verbatim quote".into()],
            summary: "summary".into(),
            confidence: 0.9,
        }
    }

    #[test]
    fn severity_parses_leniently() {
        assert_eq!(Severity::parse_lenient(Some("Severe")), Severity::Severe);
        assert_eq!(Severity::parse_lenient(Some(" mild ")), Severity::Mild);
        assert_eq!(Severity::parse_lenient(Some("extreme")), Severity::Unknown);
        assert_eq!(Severity::parse_lenient(None), Severity::Unknown);
    }

    #[test]
    fn report_completeness() {
        let identity = ContentIdentity::new("Up", Some(2009), MediaKind::Movie);
        let mut report = Report::new(identity);
        assert!(!report.is_usable());
        assert!(!report.is_complete());

        for category in Category::ALL {
            report.categories.insert(category, make_result(category, 3));
        }
        assert!(report.is_usable());
        assert!(!report.is_complete(), "complete requires a verdict");

        report.verdict = Some(OverallVerdict {
            recommendation: "fine for most ages".into(),
            rationale: "mild throughout".into(),
            context_tags: vec![],
        });
        assert!(report.is_complete());
    }

    #[test]
    fn partial_report_is_usable() {
        let identity = ContentIdentity::new("Up", Some(2009), MediaKind::Movie);
        let mut report = Report::new(identity);
        report
            .categories
            .insert(Category::Violence, make_result(Category::Violence, 2));
        assert!(report.is_usable());
        assert!(!report.is_complete());
    }

    #[test]
    fn fragments_serialize_tagged() {
        let fragment = ReportFragment::CategoryDone {
            category: Category::Violence,
            result: make_result(Category::Violence, 7),
        };
        let json = serde_json::to_string(&fragment).unwrap();
        assert!(json.contains("\"type\":\"category_done\""));
        assert!(json.contains("\"category\":\"violence\""));

        let back: ReportFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fragment);
    }

    #[test]
    fn pipeline_failure_serializes_with_kind_tag() {
        let fragment = ReportFragment::PipelineFailed {
            failure: PipelineFailure::SynthesisFailed {
                detail: "backend gone".into(),
            },
        };
        let json = serde_json::to_string(&fragment).unwrap();
        assert!(json.contains("\"type\":\"pipeline_failed\""));
        assert!(json.contains("\"kind\":\"synthesis_failed\""));
    }

    #[test]
    fn terminal_fragments_flagged() {
        let verdict = ReportFragment::Verdict {
            verdict: OverallVerdict {
                recommendation: "r".into(),
                rationale: "r".into(),
                context_tags: vec![],
            },
        };
        assert!(verdict.is_terminal());

        let progress = ReportFragment::CategoryProgress {
            category: Category::Nudity,
            partial: make_result(Category::Nudity, 1),
        };
        assert!(!progress.is_terminal());

        let done = ReportFragment::CategoryDone {
            category: Category::Nudity,
            result: make_result(Category::Nudity, 1),
        };
        assert!(!done.is_terminal(), "per-category results never end the stream");
    }

    #[test]
    fn report_roundtrips_with_category_keyed_map() {
        let identity = ContentIdentity::new("Jaws", Some(1975), MediaKind::Movie);
        let mut report = Report::new(identity);
        report
            .categories
            .insert(Category::Frightening, make_result(Category::Frightening, 8));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"frightening\""));
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
