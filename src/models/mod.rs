pub mod category;
pub mod identity;
pub mod report;

pub use category::{Category, CategoryRawText};
pub use identity::{ContentIdentity, MediaKind};
pub use report::{
    CategoryResult, ExtractionFailure, FailureKind, OverallVerdict, PipelineFailure, Report,
    ReportFragment, Severity,
};
