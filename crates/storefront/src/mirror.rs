//! Best-effort on-device mirror of the last known collection snapshots.
//!
//! The mirror is a cache, never a source of truth: stores write every
//! snapshot to it and read it back only when their subscription fails.
//! Every error is reported to the caller, who logs and drops it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from the local mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt mirror store: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Invalid store name: {0}")]
    InvalidStore(String),
}

/// Key-value mirror with replace-all semantics per store.
#[async_trait]
pub trait LocalMirror: Send + Sync {
    /// Replace the contents of `store` with `records`.
    async fn put(&self, store: &str, records: Vec<Value>) -> Result<(), MirrorError>;

    /// Read every record of `store`. A store never written reads as empty.
    async fn get_all(&self, store: &str) -> Result<Vec<Value>, MirrorError>;
}

/// Mirror keeping one JSON file per store in a directory.
#[derive(Debug, Clone)]
pub struct FileMirror {
    dir: PathBuf,
}

impl FileMirror {
    /// Open (and create if needed) a mirror rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, MirrorError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn store_path(&self, store: &str) -> Result<PathBuf, MirrorError> {
        let valid = !store.is_empty()
            && store
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(MirrorError::InvalidStore(store.to_string()));
        }
        Ok(self.dir.join(format!("{store}.json")))
    }
}

#[async_trait]
impl LocalMirror for FileMirror {
    async fn put(&self, store: &str, records: Vec<Value>) -> Result<(), MirrorError> {
        let path = self.store_path(store)?;
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(&records)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(store, count = records.len(), "Mirror store replaced");
        Ok(())
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Value>, MirrorError> {
        let path = self.store_path(store)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
