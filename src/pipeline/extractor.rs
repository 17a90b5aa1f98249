//! Per-category extraction.
//!
//! One extractor run owns exactly one generation call: build the prompt,
//! stream the response through a [`StreamDecoder`], validate each decoded
//! object, and finish with either a [`CategoryResult`] or a typed
//! [`ExtractionFailure`]. Retry policy belongs to the backend collaborator,
//! not here.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::backend::{BackendError, GenerationBackend, GenerationRequest};
use super::decoder::StreamDecoder;
use super::prompt::{build_category_prompt, CATEGORY_SYSTEM_PROMPT};
use super::validation::validate_category_payload;
use super::ExtractionError;
use crate::config::PipelineSettings;
use crate::models::{Category, CategoryRawText, CategoryResult, ExtractionFailure, FailureKind};

pub struct CategoryExtractor {
    backend: Arc<dyn GenerationBackend>,
    settings: Arc<PipelineSettings>,
}

impl CategoryExtractor {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: Arc<PipelineSettings>) -> Self {
        Self { backend, settings }
    }

    /// Run one category extraction to completion.
    ///
    /// Decoded objects that validate but get superseded by a later object
    /// are pushed into `progress_tx` as interim snapshots; the last valid
    /// object becomes the terminal result. A duplicate of the held object
    /// is ignored (backends occasionally repeat their final emission).
    pub async fn run(
        &self,
        raw: CategoryRawText,
        progress_tx: mpsc::Sender<CategoryResult>,
    ) -> Result<CategoryResult, ExtractionFailure> {
        let category = raw.category;

        // Empty non-degraded input never reaches the backend: there is
        // nothing to extract and the call would be wasted inference.
        if raw.text.trim().is_empty() && !raw.is_degraded {
            return Err(failure_from(category, ExtractionError::EmptyInput));
        }

        let deadline = self.settings.call_timeout;
        match tokio::time::timeout(deadline, self.drive(&raw, progress_tx)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(failure_from(category, err)),
            Err(_) => Err(failure_from(
                category,
                ExtractionError::DeadlineExceeded(deadline),
            )),
        }
    }

    async fn drive(
        &self,
        raw: &CategoryRawText,
        progress_tx: mpsc::Sender<CategoryResult>,
    ) -> Result<CategoryResult, ExtractionError> {
        let category = raw.category;
        let request = GenerationRequest {
            model: self.settings.extraction_model.clone(),
            system: CATEGORY_SYSTEM_PROMPT.to_string(),
            prompt: build_category_prompt(raw),
        };

        let (chunk_tx, mut chunk_rx) = mpsc::channel(self.settings.channel_capacity);
        let backend = Arc::clone(&self.backend);
        let call = tokio::spawn(async move { backend.stream_generate(request, chunk_tx).await });

        let mut decoder = StreamDecoder::new();
        let mut latest: Option<CategoryResult> = None;

        while let Some(chunk) = chunk_rx.recv().await {
            for candidate in decoder.feed(&chunk) {
                match candidate.and_then(|value| {
                    validate_category_payload(
                        category,
                        &value,
                        raw.is_degraded,
                        self.settings.degraded_confidence_cap,
                    )
                }) {
                    Ok(result) => {
                        if latest.as_ref() == Some(&result) {
                            tracing::debug!(%category, "ignoring duplicate emission");
                            continue;
                        }
                        // The held object is now known to be interim.
                        if let Some(superseded) = latest.replace(result) {
                            let _ = progress_tx.send(superseded).await;
                        }
                    }
                    Err(err) => {
                        // A later valid object may still land; keep decoding.
                        tracing::warn!(%category, error = %err, "skipping unusable candidate");
                    }
                }
            }
        }

        // Channel drained: the backend call is over. Its verdict outranks
        // anything decoded so far (a mid-stream failure fails the category).
        match call.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(ExtractionError::Backend(err)),
            Err(join_err) => {
                return Err(ExtractionError::Backend(BackendError::Stream(
                    join_err.to_string(),
                )))
            }
        }

        decoder.finish()?;
        latest.ok_or(ExtractionError::NoUsableObject)
    }
}

/// Fold an internal extraction error into the typed per-category failure
/// surfaced to the coordinator.
fn failure_from(category: Category, err: ExtractionError) -> ExtractionFailure {
    let kind = match &err {
        ExtractionError::Backend(_) => FailureKind::BackendUnavailable,
        ExtractionError::DeadlineExceeded(_) => FailureKind::Timeout,
        ExtractionError::UnterminatedObject { .. }
        | ExtractionError::InvalidJson(_)
        | ExtractionError::NoUsableObject
        | ExtractionError::InvalidPayload(_)
        | ExtractionError::EmptyInput => FailureKind::MalformedOutput,
    };
    ExtractionFailure {
        category,
        kind,
        detail: err.to_string(),
    }
}
