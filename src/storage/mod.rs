//! Blob storage abstraction.
//!
//! Every persisted artifact — `illust.json` metadata records and page
//! binaries — lives in a flat key space of the form
//! `"{user_id}/{illust_id}/{filename}"`. The two backends (local filesystem,
//! S3-compatible object store) are selected at startup and consumed through
//! the [`Storage`] trait as `Arc<dyn Storage>`.

pub mod filesystem;
pub mod s3;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;

pub use filesystem::FilesystemStorage;
pub use s3::S3Storage;

/// Errors from blob storage operations.
///
/// `NotFound` is a distinct, recoverable condition: callers treat "this key
/// never existed" differently from "storage unreachable" (which propagates
/// as fatal).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object store error for key {key}: {source}")]
    ObjectStore {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A blob downloaded to a scoped temporary file.
///
/// The scratch directory is removed when this guard is dropped, so the path
/// is only valid for the guard's lifetime.
#[derive(Debug)]
pub struct ScopedDownload {
    _tmpdir: TempDir,
    path: PathBuf,
}

impl ScopedDownload {
    pub(crate) fn new(tmpdir: TempDir, path: PathBuf) -> Self {
        Self {
            _tmpdir: tmpdir,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Key-addressed byte storage with prefix enumeration.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Enumerate keys starting with `prefix`. A prefix with no matches yields
    /// an empty list, not an error.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Fetch one key into a scoped temporary file.
    ///
    /// Returns [`StorageError::NotFound`] if the key is absent.
    async fn download(&self, key: &str) -> Result<ScopedDownload, StorageError>;

    /// Store one local file under `key`, overwriting any existing blob.
    ///
    /// The write is atomic from a reader's perspective: a concurrent
    /// `download` of the same key observes either the old or the new blob,
    /// never a partial one.
    async fn upload(&self, source: &Path, key: &str) -> Result<(), StorageError>;
}
