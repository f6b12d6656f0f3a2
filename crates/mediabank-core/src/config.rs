//! Configuration module
//!
//! Storage configuration read from the environment (and an optional `.env`
//! file). Backend construction lives in `mediabank-storage`'s factory.

use std::env;

use crate::storage_types::StorageBackend;

/// Default lifetime of a presigned URL.
pub const DEFAULT_PRESIGNED_EXPIRY_SECS: u32 = 3600;
/// Longest lifetime S3 accepts for a SigV4 presigned URL (7 days).
pub const MAX_PRESIGNED_EXPIRY_SECS: u32 = 7 * 24 * 3600;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub aws_region: Option<String>,
    pub presigned_url_expiry_secs: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Local,
            local_storage_path: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            presigned_url_expiry_secs: DEFAULT_PRESIGNED_EXPIRY_SECS,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::Local,
        };

        let presigned_url_expiry_secs = match lookup("PRESIGNED_URL_EXPIRY_SECS") {
            Some(value) => value.trim().parse::<u32>().map_err(|_| {
                anyhow::anyhow!("PRESIGNED_URL_EXPIRY_SECS must be a valid number")
            })?,
            None => DEFAULT_PRESIGNED_EXPIRY_SECS,
        };

        Ok(StorageConfig {
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            s3_bucket: lookup("S3_BUCKET"),
            s3_region: lookup("S3_REGION"),
            s3_endpoint: lookup("S3_ENDPOINT"),
            aws_region: lookup("AWS_REGION"),
            presigned_url_expiry_secs,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.presigned_url_expiry_secs == 0
            || self.presigned_url_expiry_secs > MAX_PRESIGNED_EXPIRY_SECS
        {
            return Err(anyhow::anyhow!(
                "PRESIGNED_URL_EXPIRY_SECS must be between 1 and {}",
                MAX_PRESIGNED_EXPIRY_SECS
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// S3 region, preferring `S3_REGION` over `AWS_REGION`.
    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }
}
