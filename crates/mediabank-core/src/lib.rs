//! Mediabank Core Library
//!
//! Domain model, metadata codec, processing hooks, error types and
//! configuration shared by every storage backend.
//!
//! # Round trip
//!
//! A backend persists an asset as content bytes plus the [`EncodedMedia`]
//! produced by [`codec::encode`]; on load it calls [`codec::decode`] (or a
//! custom [`MetadataCodec`]) with the stored content type and metadata and gets
//! back the same variant with the same typed fields and extra metadata.

pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod processing;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use codec::{AssetDecoder, CommonFields, EncodedMedia, MetadataCodec, MetadataFields};
pub use config::StorageConfig;
pub use error::{LogLevel, ProcessingError, ValidationError};
pub use models::{AudioAsset, MediaAsset, MediaEntity, MetadataValue, PhotoAsset, VideoAsset};
pub use processing::{
    AssetProcessor, ProcessingEvent, ProcessingOutcome, ProcessingPipeline, ProcessingStage,
    ProgressListener,
};
pub use storage_types::StorageBackend;
