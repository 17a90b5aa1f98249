//! Report persistence.
//!
//! A store holds whole reports keyed by derived content key. Both
//! operations are atomic whole-value reads/writes; nothing ever patches
//! a stored report in place.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::CacheError;
use crate::models::Report;

/// Shared report store: the second cache tier, typically backed by
/// something that outlives the process.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Report>, CacheError>;
    async fn set(&self, key: &str, report: &Report) -> Result<(), CacheError>;
}

/// Memory-resident store. Useful for tests and single-process
/// deployments where the local tier is persistence enough.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Report>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Report>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, report: &Report) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), report.clone());
        Ok(())
    }
}

/// One JSON file per key under a cache directory.
///
/// Filenames are the SHA-256 of the key, so arbitrary titles never
/// produce colliding or hostile paths. Writes go through a temp file
/// and a rename, which keeps `set` atomic on the same filesystem.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl ReportStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Report>, CacheError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Io(err)),
        };
        let report = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;
        Ok(Some(report))
    }

    async fn set(&self, key: &str, report: &Report) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let bytes =
            serde_json::to_vec_pretty(report).map_err(|e| CacheError::Corrupt(e.to_string()))?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Category, CategoryResult, ContentIdentity, MediaKind, Severity,
    };

    fn sample_report(title: &str) -> Report {
        let identity = ContentIdentity::new(title, Some(2020), MediaKind::Movie);
        let mut report = Report::new(identity);
        report.categories.insert(
            Category::Violence,
            CategoryResult {
                category: Category::Violence,
                level: Severity::Mild,
                score: 3,
                quotes: vec!["a quote".into()],
                summary: "mild fights".into(),
                confidence: 0.8,
            },
        );
        report
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("media:x_2020").await.unwrap().is_none());

        let report = sample_report("X");
        store.set("media:x_2020", &report).await.unwrap();
        let loaded = store.get("media:x_2020").await.unwrap().unwrap();
        assert_eq!(loaded, report);
    }

    #[tokio::test]
    async fn memory_store_overwrites_whole_value() {
        let store = MemoryStore::new();
        store.set("k", &sample_report("First")).await.unwrap();
        store.set("k", &sample_report("Second")).await.unwrap();
        assert_eq!(store.len().await, 1);
        let loaded = store.get("k").await.unwrap().unwrap();
        assert_eq!(loaded.identity.title, "Second");
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.get("media:y_2021").await.unwrap().is_none());
        let report = sample_report("Y");
        store.set("media:y_2021", &report).await.unwrap();
        let loaded = store.get("media:y_2021").await.unwrap().unwrap();
        assert_eq!(loaded, report);
    }

    #[tokio::test]
    async fn file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("k", &sample_report("First")).await.unwrap();
        store.set("k", &sample_report("Second")).await.unwrap();
        let loaded = store.get("k").await.unwrap().unwrap();
        assert_eq!(loaded.identity.title, "Second");
    }

    #[tokio::test]
    async fn file_store_hostile_keys_stay_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let key = "media:../../etc/passwd: a/b\\c_1999";
        store.set(key, &sample_report("Hostile")).await.unwrap();
        assert!(store.get(key).await.unwrap().is_some());

        // Exactly one file, inside the cache dir.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn file_store_corrupt_entry_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        store.set("k", &sample_report("Ok")).await.unwrap();
        let path = store.path_for("k");
        std::fs::write(&path, b"not json at all").unwrap();

        assert!(matches!(store.get("k").await, Err(CacheError::Corrupt(_))));
    }
}
