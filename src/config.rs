//! Pipeline settings.
//!
//! All tunables arrive as one explicit value passed into constructors;
//! the core never reads ambient global state, which keeps it testable
//! without environment setup. Binaries that do want environment-driven
//! configuration call [`PipelineSettings::from_env`] at the edge.

use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Base URL of the generation backend.
    pub backend_url: String,
    /// Model driving the four per-category extraction calls.
    pub extraction_model: String,
    /// Model driving the final verdict synthesis call.
    pub synthesis_model: String,
    /// Hard deadline for a single generation call (category or verdict).
    pub call_timeout: Duration,
    /// Ceiling applied to model confidence when the input was a degraded
    /// placeholder.
    pub degraded_confidence_cap: f32,
    /// Capacity of fragment and chunk channels. Backpressure above this
    /// suspends the producer rather than buffering unboundedly.
    pub channel_capacity: usize,
    /// Directory for the file-backed shared report store.
    pub cache_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:11434".into(),
            extraction_model: "gemma3:12b".into(),
            synthesis_model: "gemma3:27b".into(),
            call_timeout: Duration::from_secs(120),
            degraded_confidence_cap: 0.35,
            channel_capacity: 32,
            cache_dir: default_cache_dir(),
        }
    }
}

impl PipelineSettings {
    /// Read settings from `REELGUARD_*` environment variables, falling
    /// back to the defaults for anything unset. For binaries only.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_url: env_or("REELGUARD_BACKEND_URL", defaults.backend_url),
            extraction_model: env_or("REELGUARD_EXTRACTION_MODEL", defaults.extraction_model),
            synthesis_model: env_or("REELGUARD_SYNTHESIS_MODEL", defaults.synthesis_model),
            call_timeout: std::env::var("REELGUARD_CALL_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.call_timeout),
            degraded_confidence_cap: defaults.degraded_confidence_cap,
            channel_capacity: defaults.channel_capacity,
            cache_dir: std::env::var("REELGUARD_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
        }
    }
}

fn env_or(key: &str, fallback: String) -> String {
    std::env::var(key).unwrap_or(fallback)
}

/// Default shared-store directory: the platform cache dir, or the system
/// temp dir where none exists (containers, stripped-down CI).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("reelguard")
}
