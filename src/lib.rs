//! Reelguard: incremental structured extraction of content-sensitivity
//! reports.
//!
//! Crowd-sourced parental-advisory text for a film or show goes in; a
//! structured, scored report comes out, streamed to the caller fragment
//! by fragment as a generative backend produces it. Four fixed
//! categories (sexual content, violence, profanity, frightening
//! material) are extracted concurrently and surface in completion order,
//! then a single synthesis call produces the overall verdict. A two-tier
//! cache (process-local + shared store) in front of the whole thing
//! keeps repeat queries from paying inference cost twice.
//!
//! The entry point is [`AnalysisPipeline::analyze`]. Title resolution
//! and advisory-page scraping are external collaborators, consumed
//! through the traits in [`resolver`] and [`scraper`].

pub mod cache;
pub mod config;
pub mod facade;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod scraper;

pub use cache::{CacheError, CacheGateway, FileStore, MemoryStore, ReportStore};
pub use config::PipelineSettings;
pub use facade::{AnalysisPipeline, ValidationError};
pub use models::{
    Category, CategoryRawText, CategoryResult, ContentIdentity, ExtractionFailure, FailureKind,
    MediaKind, OverallVerdict, PipelineFailure, Report, ReportFragment, Severity,
};
pub use pipeline::{
    BackendError, ExtractionCoordinator, GenerationBackend, GenerationRequest, MockBackend,
    OllamaBackend, StreamDecoder,
};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. For binaries; embedders that
/// bring their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
