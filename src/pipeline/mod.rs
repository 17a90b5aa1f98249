pub mod backend;
pub mod coordinator;
pub mod decoder;
pub mod extractor;
pub mod prompt;
pub mod validation;

pub use backend::{BackendError, GenerationBackend, GenerationRequest, MockBackend, OllamaBackend};
pub use coordinator::ExtractionCoordinator;
pub use decoder::StreamDecoder;
pub use extractor::CategoryExtractor;

use thiserror::Error;

/// Errors internal to one generation call's consumption. The coordinator
/// never sees these directly; the extractor folds them into a typed
/// per-category [`crate::models::ExtractionFailure`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("backend call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("stream ended inside an unterminated JSON object ({depth} levels open)")]
    UnterminatedObject { depth: u32 },

    #[error("balanced candidate is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("no usable JSON object in the response stream")]
    NoUsableObject,

    #[error("payload rejected: {0}")]
    InvalidPayload(String),

    #[error("empty raw text for non-degraded input; backend not called")]
    EmptyInput,

    #[error("generation deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),
}
