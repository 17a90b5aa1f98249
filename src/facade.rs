//! Pipeline façade: the single entry point external callers use.
//!
//! Validates the input shape and hands off to the cache gateway. No
//! other business logic lives here.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::cache::{CacheGateway, ReportStore};
use crate::config::PipelineSettings;
use crate::models::{Category, CategoryRawText, ContentIdentity, ReportFragment};
use crate::pipeline::{ExtractionCoordinator, GenerationBackend};

/// Input-shape errors. Caller's fault, surfaced immediately, no backend
/// call is ever made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("year {0} is not a 4-digit year")]
    BadYear(u16),

    #[error("missing advisory text for category '{0}'")]
    MissingCategory(Category),

    #[error("more than one advisory text supplied for category '{0}'")]
    DuplicateCategory(Category),

    #[error("empty advisory text for non-degraded category '{0}'")]
    EmptyCategoryText(Category),
}

/// The assembled pipeline: coordinator behind gateway behind this façade.
///
/// External collaborators (resolver, scraper) run before `analyze` and
/// supply its inputs; the transport layer consumes its output channel.
pub struct AnalysisPipeline {
    gateway: CacheGateway,
}

impl AnalysisPipeline {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        shared: Arc<dyn ReportStore>,
        settings: PipelineSettings,
    ) -> Self {
        let settings = Arc::new(settings);
        let coordinator = ExtractionCoordinator::new(backend, Arc::clone(&settings));
        let gateway = CacheGateway::new(coordinator, shared, &settings);
        Self { gateway }
    }

    /// Analyze one title: returns a live sequence of report fragments, or
    /// fails fast when the input shape is wrong.
    ///
    /// `force_refresh` bypasses the cache; authenticating the flag is the
    /// transport layer's responsibility.
    pub fn analyze(
        &self,
        identity: ContentIdentity,
        texts: Vec<CategoryRawText>,
        force_refresh: bool,
    ) -> Result<mpsc::Receiver<ReportFragment>, ValidationError> {
        validate_request(&identity, &texts)?;
        Ok(self.gateway.get_or_compute(identity, texts, force_refresh))
    }
}

fn validate_request(
    identity: &ContentIdentity,
    texts: &[CategoryRawText],
) -> Result<(), ValidationError> {
    if identity.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if let Some(year) = identity.year {
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::BadYear(year));
        }
    }

    for category in Category::ALL {
        match texts.iter().filter(|t| t.category == category).count() {
            0 => return Err(ValidationError::MissingCategory(category)),
            1 => {}
            _ => return Err(ValidationError::DuplicateCategory(category)),
        }
    }
    for text in texts {
        if !text.is_degraded && text.text.trim().is_empty() {
            return Err(ValidationError::EmptyCategoryText(text.category));
        }
    }
    Ok(())
}
