//! Generation backend seam.
//!
//! The pipeline consumes a backend as an append-only sequence of text
//! fragments pushed into a channel, terminated by the call resolving.
//! [`OllamaBackend`] speaks the local-LLM NDJSON streaming protocol over
//! HTTP; [`MockBackend`] plays scripted responses for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// One request to the text-generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
}

/// Errors from the generation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("generation backend unreachable at {0}")]
    Unreachable(String),

    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend stream failed mid-response: {0}")]
    Stream(String),

    #[error("malformed backend frame: {0}")]
    Frame(String),
}

/// Streaming text-generation backend.
///
/// Implementations push raw text fragments into `chunk_tx` as they
/// arrive and return once the backend signals end-of-stream. A dropped
/// receiver means the caller cancelled; implementations stop silently
/// rather than erroring.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn stream_generate(
        &self,
        request: GenerationRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<(), BackendError>;
}

// ──────────────────────────────────────────────
// Production backend: NDJSON over HTTP
// ──────────────────────────────────────────────

/// Request body for the `/api/generate` endpoint.
#[derive(Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// One NDJSON frame of a streaming response.
#[derive(Deserialize)]
struct GenerateFrame {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// HTTP client for an Ollama-compatible generation server.
///
/// With `stream: true` the server answers with one JSON object per line;
/// each frame carries a text fragment and the last frame sets `done`.
pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a backend pointing at `base_url`. Only connection
    /// establishment is bounded here; the per-call deadline belongs to
    /// the extractor.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Default local instance at the standard port.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", Duration::from_secs(5))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn stream_generate(
        &self,
        request: GenerationRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<(), BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::Unreachable(self.base_url.clone())
                } else {
                    BackendError::Stream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| BackendError::Stream(e.to_string()))?;
            pending.extend_from_slice(&bytes);

            // Frames are newline-delimited; a frame never spans lines.
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let frame: GenerateFrame = serde_json::from_str(line)
                    .map_err(|e| BackendError::Frame(e.to_string()))?;

                if !frame.response.is_empty()
                    && chunk_tx.send(frame.response).await.is_err()
                {
                    // Receiver dropped: the caller cancelled this call.
                    return Ok(());
                }
                if frame.done {
                    return Ok(());
                }
            }
        }

        Err(BackendError::Stream(
            "stream ended without a terminal frame".into(),
        ))
    }
}

// ──────────────────────────────────────────────
// Scripted backend for tests
// ──────────────────────────────────────────────

/// One scripted response: fragments played in order after an optional
/// delay, then an optional terminal error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedResponse {
    pub fragments: Vec<String>,
    pub delay: Duration,
    /// When set, the call fails with `BackendError::Stream(..)` after the
    /// fragments have been sent.
    pub error: Option<String>,
}

impl ScriptedResponse {
    /// A response that emits `text` as a single fragment.
    pub fn whole(text: &str) -> Self {
        Self {
            fragments: vec![text.to_string()],
            ..Self::default()
        }
    }

    /// A response that emits `text` in small fixed-size pieces, the way
    /// a real token stream arrives.
    pub fn chunked(text: &str, piece: usize) -> Self {
        let mut fragments = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let mut cut = piece.min(rest.len());
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            fragments.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        Self {
            fragments,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A call that fails immediately, emitting nothing.
    pub fn failing(detail: &str) -> Self {
        Self {
            error: Some(detail.to_string()),
            ..Self::default()
        }
    }
}

/// Scripted generation backend for tests.
///
/// Routes each call to the first rule whose needle appears in the
/// prompt, falling back to a default response. Counts every call so
/// tests can assert how many requests actually reached the backend.
pub struct MockBackend {
    rules: Vec<(String, ScriptedResponse)>,
    fallback: ScriptedResponse,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(fallback: ScriptedResponse) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Add a routing rule: calls whose prompt contains `needle` play
    /// `response`. Rules are matched in insertion order.
    pub fn with_rule(mut self, needle: &str, response: ScriptedResponse) -> Self {
        self.rules.push((needle.to_string(), response));
        self
    }

    /// Total calls that reached this backend.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn script_for(&self, prompt: &str) -> ScriptedResponse {
        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn stream_generate(
        &self,
        request: GenerationRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script_for(&request.prompt);

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        for fragment in script.fragments {
            if chunk_tx.send(fragment).await.is_err() {
                return Ok(());
            }
        }
        if let Some(detail) = script.error {
            return Err(BackendError::Stream(detail));
        }
        Ok(())
    }
}
