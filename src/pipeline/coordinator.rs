//! Fan-out / fan-in across the four category extractions.
//!
//! One task per category, no ordering dependency between them; whichever
//! backend responds first is surfaced first. That completion-order
//! delivery is a product behavior (report cards pop up as they finish),
//! not an implementation accident. After all four terminate, a single
//! synthesis call produces the overall verdict from the successes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::backend::{BackendError, GenerationBackend, GenerationRequest};
use super::decoder::StreamDecoder;
use super::extractor::CategoryExtractor;
use super::prompt::{build_verdict_prompt, VERDICT_SYSTEM_PROMPT};
use super::validation::validate_verdict_payload;
use super::ExtractionError;
use crate::config::PipelineSettings;
use crate::models::{
    Category, CategoryRawText, CategoryResult, ContentIdentity, ExtractionFailure,
    OverallVerdict, PipelineFailure, ReportFragment,
};

/// Event from one category task into the merge point.
enum TaskEvent {
    Progress(Category, CategoryResult),
    Terminal(Category, Result<CategoryResult, ExtractionFailure>),
}

pub struct ExtractionCoordinator {
    backend: Arc<dyn GenerationBackend>,
    settings: Arc<PipelineSettings>,
}

impl ExtractionCoordinator {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: Arc<PipelineSettings>) -> Self {
        Self { backend, settings }
    }

    /// Launch a full extraction run. Fragments arrive on the returned
    /// receiver in completion order; the sequence is finite and ends with
    /// a terminal fragment. Dropping the receiver cancels the run.
    pub fn run(
        &self,
        identity: ContentIdentity,
        texts: Vec<CategoryRawText>,
    ) -> mpsc::Receiver<ReportFragment> {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity);
        let backend = Arc::clone(&self.backend);
        let settings = Arc::clone(&self.settings);

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "extraction_run",
            run = %run_id,
            key = %identity.derive_key(),
        );
        tokio::spawn(drive_run(backend, settings, texts, tx).instrument(span));

        rx
    }
}

async fn drive_run(
    backend: Arc<dyn GenerationBackend>,
    settings: Arc<PipelineSettings>,
    texts: Vec<CategoryRawText>,
    tx: mpsc::Sender<ReportFragment>,
) {
    let (event_tx, mut event_rx) = mpsc::channel::<TaskEvent>(settings.channel_capacity);

    let mut tasks = JoinSet::new();
    for raw in texts {
        let extractor = CategoryExtractor::new(Arc::clone(&backend), Arc::clone(&settings));
        let event_tx = event_tx.clone();
        tasks.spawn(async move {
            let category = raw.category;

            // Interim snapshots flow while the extraction is still running;
            // awaiting the forwarder before the terminal event keeps each
            // category's own fragments strictly ordered.
            let (progress_tx, mut progress_rx) = mpsc::channel(8);
            let forwarder = {
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    while let Some(partial) = progress_rx.recv().await {
                        if event_tx
                            .send(TaskEvent::Progress(category, partial))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                })
            };

            let outcome = extractor.run(raw, progress_tx).await;
            let _ = forwarder.await;
            let _ = event_tx.send(TaskEvent::Terminal(category, outcome)).await;
        });
    }
    drop(event_tx);

    let mut successes: Vec<CategoryResult> = Vec::new();
    let mut failures: Vec<ExtractionFailure> = Vec::new();

    loop {
        let event = tokio::select! {
            // Caller went away: stop the whole run promptly.
            _ = tx.closed() => {
                tasks.abort_all();
                return;
            }
            event = event_rx.recv() => match event {
                Some(event) => event,
                None => break, // all four categories terminated
            },
        };

        let fragment = match event {
            TaskEvent::Progress(category, partial) => {
                ReportFragment::CategoryProgress { category, partial }
            }
            TaskEvent::Terminal(category, Ok(result)) => {
                tracing::info!(%category, score = result.score, "category resolved");
                successes.push(result.clone());
                ReportFragment::CategoryDone { category, result }
            }
            TaskEvent::Terminal(category, Err(failure)) => {
                tracing::warn!(%category, kind = ?failure.kind, detail = %failure.detail, "category failed");
                failures.push(failure.clone());
                ReportFragment::CategoryFailed { category, failure }
            }
        };

        if tx.send(fragment).await.is_err() {
            tasks.abort_all();
            return;
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "category task aborted unexpectedly");
        }
    }

    if successes.is_empty() {
        let _ = tx
            .send(ReportFragment::PipelineFailed {
                failure: PipelineFailure::AllCategoriesFailed { failures },
            })
            .await;
        return;
    }

    // Exactly one synthesis call, seeded with whatever succeeded.
    let verdict = tokio::select! {
        _ = tx.closed() => return,
        verdict = synthesize_verdict(&backend, &settings, &successes) => verdict,
    };

    let terminal = match verdict {
        Ok(verdict) => ReportFragment::Verdict { verdict },
        Err(err) => {
            tracing::warn!(error = %err, "verdict synthesis failed");
            ReportFragment::PipelineFailed {
                failure: PipelineFailure::SynthesisFailed {
                    detail: err.to_string(),
                },
            }
        }
    };
    let _ = tx.send(terminal).await;
}

/// Drive the verdict generation call through its own decoder.
async fn synthesize_verdict(
    backend: &Arc<dyn GenerationBackend>,
    settings: &Arc<PipelineSettings>,
    successes: &[CategoryResult],
) -> Result<OverallVerdict, ExtractionError> {
    let request = GenerationRequest {
        model: settings.synthesis_model.clone(),
        system: VERDICT_SYSTEM_PROMPT.to_string(),
        prompt: build_verdict_prompt(successes),
    };

    let deadline = settings.call_timeout;
    let drive = async {
        let (chunk_tx, mut chunk_rx) = mpsc::channel(settings.channel_capacity);
        let backend = Arc::clone(backend);
        let call = tokio::spawn(async move { backend.stream_generate(request, chunk_tx).await });

        let mut decoder = StreamDecoder::new();
        let mut latest: Option<OverallVerdict> = None;

        while let Some(chunk) = chunk_rx.recv().await {
            for candidate in decoder.feed(&chunk) {
                match candidate.and_then(|value| validate_verdict_payload(&value)) {
                    Ok(verdict) => latest = Some(verdict),
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unusable verdict candidate");
                    }
                }
            }
        }

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
    };

    tokio::time::timeout(deadline, drive)
        .await
        .map_err(|_| ExtractionError::DeadlineExceeded(deadline))?
}
