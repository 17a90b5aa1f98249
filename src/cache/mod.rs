//! Two-tier read-through cache in front of the extraction coordinator.
//!
//! Lookup order: process-local map, then the shared store, then a full
//! recomputation. Hits replay the stored report as one terminal fragment
//! (no partial-card delivery); misses stream the coordinator's fragments
//! to the caller in real time while accumulating them into the report
//! that gets persisted. A per-key in-flight lock bounds inference cost:
//! concurrent requests for one uncached key produce exactly one backend
//! run.

pub mod store;

pub use store::{FileStore, MemoryStore, ReportStore};

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::config::PipelineSettings;
use crate::models::{CategoryRawText, ContentIdentity, Report, ReportFragment};
use crate::pipeline::ExtractionCoordinator;

/// Errors from report stores. The gateway downgrades all of them: read
/// errors become misses, write errors become log lines.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored report is unreadable: {0}")]
    Corrupt(String),
}

/// Shared mutable state of one gateway, split out so the driver task can
/// own a handle without borrowing the gateway.
struct GatewayInner {
    coordinator: ExtractionCoordinator,
    shared: Arc<dyn ReportStore>,
    /// Local tier: advisory, unbounded, lost entries just mean a
    /// shared-store read. Eviction belongs to a surrounding layer.
    local: RwLock<HashMap<String, Report>>,
    /// One lock per key; holders are the only requests allowed to reach
    /// the backend for that key. Entries are tiny and keyed by distinct
    /// titles, so the map is left to grow like the local tier does.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    capacity: usize,
}

/// Idempotent, at-most-one-recomputation cache gateway.
pub struct CacheGateway {
    inner: Arc<GatewayInner>,
}

impl CacheGateway {
    pub fn new(
        coordinator: ExtractionCoordinator,
        shared: Arc<dyn ReportStore>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                coordinator,
                shared,
                local: RwLock::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                capacity: settings.channel_capacity,
            }),
        }
    }

    /// Serve a report for `identity`, from cache when possible.
    ///
    /// `force_refresh` is the privileged bypass: it skips both cache
    /// tiers and overwrites the stored report afterward. Authorizing the
    /// flag is the transport layer's job, not this component's.
    ///
    /// Fragments arrive on the returned receiver; dropping it cancels an
    /// in-flight recomputation, and a cancelled recomputation never
    /// persists anything.
    pub fn get_or_compute(
        &self,
        identity: ContentIdentity,
        texts: Vec<CategoryRawText>,
        force_refresh: bool,
    ) -> mpsc::Receiver<ReportFragment> {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            drive(inner, identity, texts, force_refresh, tx).await;
        });
        rx
    }
}

async fn drive(
    inner: Arc<GatewayInner>,
    identity: ContentIdentity,
    texts: Vec<CategoryRawText>,
    force_refresh: bool,
    tx: mpsc::Sender<ReportFragment>,
) {
    let key = identity.derive_key();

    if !force_refresh {
        if let Some(report) = lookup(&inner, &key).await {
            tracing::debug!(key = %key, "cache hit");
            let _ = tx.send(ReportFragment::CachedReport { report }).await;
            return;
        }
    }

    // At most one recomputation per key reaches the backend. Whoever
    // holds the lock computes; everyone else waits, then re-reads the
    // cache the winner just filled.
    let key_lock = {
        let mut inflight = inner.inflight.lock().await;
        Arc::clone(
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    };
    let _guard = key_lock.lock().await;

    if !force_refresh {
        if let Some(report) = lookup(&inner, &key).await {
            tracing::debug!(key = %key, "cache hit after waiting on in-flight run");
            let _ = tx.send(ReportFragment::CachedReport { report }).await;
            return;
        }
    }

    tracing::info!(key = %key, force_refresh, "cache miss, recomputing");
    let mut run_rx = inner.coordinator.run(identity.clone(), texts);
    let mut report = Report::new(identity);

    while let Some(fragment) = run_rx.recv().await {
        match &fragment {
            ReportFragment::CategoryDone { result, .. } => {
                report.categories.insert(result.category, result.clone());
            }
            ReportFragment::Verdict { verdict } => {
                report.verdict = Some(verdict.clone());
            }
            _ => {}
        }
        if tx.send(fragment).await.is_err() {
            // Caller disconnected mid-run. The coordinator cancels when
            // its receiver drops; a cancelled run persists nothing.
            tracing::debug!(key = %key, "caller went away, abandoning recomputation");
            return;
        }
    }

    if !report.is_usable() {
        // Total failure: never poison the cache, a later retry must be
        // able to recompute fresh.
        tracing::warn!(key = %key, "recomputation failed, nothing persisted");
        return;
    }

    inner
        .local
        .write()
        .await
        .insert(key.clone(), report.clone());
    if let Err(err) = inner.shared.set(&key, &report).await {
        tracing::warn!(key = %key, error = %err, "shared store write failed; response already delivered");
    }
}

/// Read-through lookup: local tier first, then the shared store (which
/// repopulates the local tier on hit). Store errors degrade to a miss.
async fn lookup(inner: &GatewayInner, key: &str) -> Option<Report> {
    if let Some(hit) = inner.local.read().await.get(key).cloned() {
        return Some(hit);
    }
    match inner.shared.get(key).await {
        Ok(Some(report)) => {
            inner
                .local
                .write()
                .await
                .insert(key.to_string(), report.clone());
            Some(report)
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key = %key, error = %err, "shared store read failed; treating as miss");
            None
        }
    }
}
