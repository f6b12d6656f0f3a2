//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use std::io;

use async_trait::async_trait;
use mediabank_core::{MediaAsset, ValidationError};
use thiserror::Error;

use crate::StorageBackend;

/// Storage operation errors
///
/// "Not found" is not an error for `load`, `exists` and `delete`: they report it
/// through their return value. Every variant here is a failure the caller must
/// be able to tell apart from a missing object.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Storage full: {0}")]
    StorageFull(String),

    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Classify an io error by kind; `context` names the failed operation.
    pub fn from_io(context: impl Into<String>, source: io::Error) -> Self {
        let context = context.into();
        match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(context),
            io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(format!("{}: {}", context, source))
            }
            io::ErrorKind::StorageFull => {
                StorageError::StorageFull(format!("{}: {}", context, source))
            }
            io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
                StorageError::Transient(format!("{}: {}", context, source))
            }
            _ => StorageError::Io { context, source },
        }
    }

    /// Whether retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }

    /// Machine-readable error code (e.g., "PERMISSION_DENIED")
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::InvalidPath(_) => "INVALID_PATH",
            StorageError::Validation(_) => "VALIDATION_ERROR",
            StorageError::PermissionDenied(_) => "PERMISSION_DENIED",
            StorageError::StorageFull(_) => "STORAGE_FULL",
            StorageError::Transient(_) => "TRANSIENT_BACKEND_ERROR",
            StorageError::Io { .. } => "IO_ERROR",
            StorageError::Backend(_) => "BACKEND_ERROR",
            StorageError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (object storage, local filesystem) implement this
/// trait so callers can persist media without coupling to a backend.
///
/// Each call finishes its I/O before the returned future resolves; backends
/// spawn no tasks of their own. Concurrent saves to the same path are
/// last-writer-wins without locking or versioning; operations on distinct
/// paths share no mutable state.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist `asset` (content, content type and metadata) at `path`.
    ///
    /// Returns `Ok(false)` without touching storage when the asset has no
    /// content: a durable object needs its bytes. Invalid attributes are a
    /// `StorageError::Validation`.
    async fn save(&self, asset: &dyn MediaAsset, path: &str) -> StorageResult<bool>;

    /// Reconstruct the asset stored at `path`, or `Ok(None)` if there is none.
    ///
    /// With `with_content = false` the payload is not fetched and the asset
    /// comes back metadata-only.
    async fn load(&self, path: &str, with_content: bool)
        -> StorageResult<Option<Box<dyn MediaAsset>>>;

    /// Delete the object at `path`. `Ok(false)` if it did not exist.
    async fn delete(&self, path: &str) -> StorageResult<bool>;

    /// Check if an object exists at `path`
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Metadata-only load.
    async fn load_metadata(&self, path: &str) -> StorageResult<Option<Box<dyn MediaAsset>>> {
        self.load(path, false).await
    }
}

/// Last path segment, used as the name of a loaded asset.
pub(crate) fn name_from_path(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
        .to_string()
}
