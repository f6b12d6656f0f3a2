//! Mediabank Storage Library
//!
//! This crate provides the storage abstraction and its implementations: the
//! [`Storage`] trait, a local filesystem backend and an object storage backend
//! (S3 and S3-compatible providers through `object_store`).
//!
//! # Paths
//!
//! Paths are relative, `/`-separated keys (e.g. `music/a.mp3`). The local
//! backend rejects absolute paths, `..` components and anything resolving
//! outside its root. It keeps each asset in a single file: a short header
//! line with the encoded metadata, followed by the content bytes.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use mediabank_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use object::ObjectStorage;
pub use traits::{Storage, StorageError, StorageResult};
