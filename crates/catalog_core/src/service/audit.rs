//! Durable audit trail for import batches.
//!
//! # Responsibility
//! - Persist the raw request and the result map of every batch under its
//!   correlation id.
//!
//! # Invariants
//! - The request blob is written before the batch touches the catalog store.
//! - Blobs are keyed by `(correlation_id, AuditBlob)`; a rewrite replaces.

use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which of the two per-batch blobs is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuditBlob {
    Request,
    Result,
}

impl AuditBlob {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Request => "request.json",
            Self::Result => "result.json",
        }
    }
}

#[derive(Debug)]
pub enum AuditError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
    /// Correlation id would escape the audit root.
    InvalidCorrelationId(String),
    Poisoned,
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "audit write to `{}` failed: {source}", path.display())
            }
            Self::Encode(err) => write!(f, "audit blob encoding failed: {err}"),
            Self::InvalidCorrelationId(id) => write!(f, "invalid correlation id `{id}`"),
            Self::Poisoned => write!(f, "audit store lock poisoned"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Write-only audit sink shared across batch workers.
pub trait AuditStore: Send + Sync {
    fn put(&self, correlation_id: &str, blob: AuditBlob, body: &Value) -> Result<(), AuditError>;
}

/// Stores blobs as `<root>/<correlation_id>/<blob>.json`.
#[derive(Debug, Clone)]
pub struct FsAuditStore {
    root: PathBuf,
}

impl FsAuditStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one blob; does not check existence.
    pub fn blob_path(&self, correlation_id: &str, blob: AuditBlob) -> PathBuf {
        self.root.join(correlation_id).join(blob.file_name())
    }
}

impl AuditStore for FsAuditStore {
    fn put(&self, correlation_id: &str, blob: AuditBlob, body: &Value) -> Result<(), AuditError> {
        if correlation_id.is_empty()
            || !correlation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AuditError::InvalidCorrelationId(correlation_id.to_string()));
        }

        let dir = self.root.join(correlation_id);
        std::fs::create_dir_all(&dir).map_err(|source| AuditError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(blob.file_name());
        let bytes = serde_json::to_vec_pretty(body)?;
        std::fs::write(&path, bytes).map_err(|source| AuditError::Io { path, source })
    }
}

/// In-process audit store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    blobs: Mutex<BTreeMap<(String, AuditBlob), Value>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, correlation_id: &str, blob: AuditBlob) -> Option<Value> {
        self.blobs
            .lock()
            .ok()?
            .get(&(correlation_id.to_string(), blob))
            .cloned()
    }

    /// Distinct correlation ids seen so far, sorted.
    pub fn correlation_ids(&self) -> Vec<String> {
        let Ok(blobs) = self.blobs.lock() else {
            return Vec::new();
        };
        let mut ids: Vec<String> = blobs.keys().map(|(id, _)| id.clone()).collect();
        ids.dedup();
        ids
    }
}

impl AuditStore for MemoryAuditStore {
    fn put(&self, correlation_id: &str, blob: AuditBlob, body: &Value) -> Result<(), AuditError> {
        let mut blobs = self.blobs.lock().map_err(|_| AuditError::Poisoned)?;
        blobs.insert((correlation_id.to_string(), blob), body.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditBlob, AuditError, AuditStore, FsAuditStore, MemoryAuditStore};
    use serde_json::json;

    #[test]
    fn fs_store_writes_one_directory_per_correlation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAuditStore::new(dir.path());
        let request = json!({"collections": [], "families": []});

        store.put("batch-1", AuditBlob::Request, &request).unwrap();
        store
            .put("batch-1", AuditBlob::Result, &json!({"collections": ["a"]}))
            .unwrap();

        let written = std::fs::read_to_string(store.blob_path("batch-1", AuditBlob::Request)).unwrap();
        let decoded: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(decoded, request);
        assert!(dir.path().join("batch-1").join("result.json").exists());
    }

    #[test]
    fn fs_store_rejects_path_like_correlation_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsAuditStore::new(dir.path());
        let err = store
            .put("../escape", AuditBlob::Request, &json!({}))
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidCorrelationId(_)));
    }

    #[test]
    fn memory_store_keeps_both_blobs() {
        let store = MemoryAuditStore::new();
        store.put("c1", AuditBlob::Request, &json!({"x": 1})).unwrap();
        store.put("c1", AuditBlob::Result, &json!({"y": 2})).unwrap();

        assert_eq!(store.get("c1", AuditBlob::Request), Some(json!({"x": 1})));
        assert_eq!(store.get("c1", AuditBlob::Result), Some(json!({"y": 2})));
        assert_eq!(store.correlation_ids(), vec!["c1".to_string()]);
    }
}
