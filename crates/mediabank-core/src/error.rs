//! Error types module
//!
//! Errors raised by the domain model itself. Storage failures live in the
//! `mediabank-storage` crate; metadata decoding never fails (it degrades to
//! defaults), so there is no decode error here.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Attribute or invariant violation on a media entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be a finite, non-negative number (got {value})")]
    NegativeOrNonFinite { field: &'static str, value: f64 },

    #[error("Invalid codec '{0}': expected a bare content-type subtype")]
    InvalidCodec(String),

    #[error("Invalid resolution '{0}': expected WIDTHxHEIGHT")]
    InvalidResolution(String),

    #[error("Size cannot be set independently while content is present ({content_len} bytes)")]
    SizeWithContent { content_len: u64 },

    #[error("Invalid metadata key '{0}': expected letters, digits, '-', '_' or '.'")]
    InvalidMetadataKey(String),

    #[error("Metadata key '{0}' is reserved for a typed or storage field")]
    ReservedMetadataKey(String),
}

impl ValidationError {
    /// Machine-readable error code (e.g., "INVALID_CODEC")
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::Empty { .. } => "EMPTY_FIELD",
            ValidationError::NegativeOrNonFinite { .. } => "INVALID_NUMBER",
            ValidationError::InvalidCodec(_) => "INVALID_CODEC",
            ValidationError::InvalidResolution(_) => "INVALID_RESOLUTION",
            ValidationError::SizeWithContent { .. } => "SIZE_WITH_CONTENT",
            ValidationError::InvalidMetadataKey(_) => "INVALID_METADATA_KEY",
            ValidationError::ReservedMetadataKey(_) => "RESERVED_METADATA_KEY",
        }
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

/// Failure reported by a processing strategy.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Processing {name} failed: {message}")]
    Failed { name: String, message: String },

    #[error("Processing {name} failed")]
    FailedWithSource {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ProcessingError {
    pub fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}
