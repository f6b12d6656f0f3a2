use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use mediabank_core::codec::{keys::PROVIDER_PREFIX, BASE_CONTENT_TYPE};
use mediabank_core::config::MAX_PRESIGNED_EXPIRY_SECS;
use mediabank_core::{CommonFields, MediaAsset, MetadataCodec};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
};

use crate::traits::{name_from_path, Storage, StorageError, StorageResult};
use crate::StorageBackend;

/// Object storage implementation (S3 and S3-compatible providers)
///
/// One asset is one object: the content type is the object's content-type
/// attribute and the encoded metadata map its user metadata.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    bucket: String,
    codec: MetadataCodec,
}

impl fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("store", &self.store.to_string())
            .field("bucket", &self.bucket)
            .field("signed_urls", &self.signer.is_some())
            .field("codec", &self.codec)
            .finish()
    }
}

impl ObjectStorage {
    /// Create an S3-backed ObjectStorage
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials come from the environment (`AWS_ACCESS_KEY_ID`, ...).
    pub async fn s3(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let store = Arc::new(store);

        Ok(Self::with_store(store.clone(), bucket).with_signer(store))
    }

    /// Wrap any object store, e.g. `InMemory` in tests. No presigned URLs
    /// until a signer is attached.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        ObjectStorage {
            store,
            signer: None,
            bucket: bucket.into(),
            codec: MetadataCodec::default(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_codec(mut self, codec: MetadataCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Time-limited GET URL for the object at `path`.
    ///
    /// `expires_in_secs` must be between 1 second and 7 days. Nothing is
    /// checked or changed in the store.
    pub async fn presigned_url(&self, path: &str, expires_in_secs: u32) -> StorageResult<String> {
        if !(1..=MAX_PRESIGNED_EXPIRY_SECS).contains(&expires_in_secs) {
            return Err(StorageError::Config(format!(
                "presigned URL expiry must be between 1 and {} seconds, got {}",
                MAX_PRESIGNED_EXPIRY_SECS, expires_in_secs
            )));
        }
        let signer = self.signer.as_ref().ok_or_else(|| {
            StorageError::Config(format!(
                "store for bucket {} cannot sign URLs",
                self.bucket
            ))
        })?;
        let location = location(path)?;

        let url = signer
            .signed_url(
                Method::GET,
                &location,
                Duration::from_secs(u64::from(expires_in_secs)),
            )
            .await
            .map_err(|e| map_error(path, e))?;

        Ok(url.to_string())
    }

    /// Payload of the object at `path`, for assets loaded without content.
    pub async fn fetch_content(&self, path: &str) -> StorageResult<Option<Bytes>> {
        let location = location(path)?;
        let start = std::time::Instant::now();

        let result = match self.store.get_opts(&location, GetOptions::default()).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(self.log_failure("fetch", path, start, e)),
        };
        let bytes = result
            .bytes()
            .await
            .map_err(|e| self.log_failure("fetch", path, start, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object fetch successful"
        );

        Ok(Some(bytes))
    }

    fn log_failure(
        &self,
        operation: &str,
        path: &str,
        start: std::time::Instant,
        err: ObjectStoreError,
    ) -> StorageError {
        tracing::error!(
            error = %err,
            bucket = %self.bucket,
            key = %path,
            operation = operation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage request failed"
        );
        map_error(path, err)
    }
}

fn location(path: &str) -> StorageResult<Path> {
    if path.trim_matches('/').is_empty() {
        return Err(StorageError::InvalidPath(format!("'{}': empty path", path)));
    }
    Path::parse(path).map_err(|e| StorageError::InvalidPath(format!("{}: {}", path, e)))
}

fn map_error(path: &str, err: ObjectStoreError) -> StorageError {
    match &err {
        ObjectStoreError::NotFound { .. } => StorageError::NotFound(path.to_string()),
        ObjectStoreError::PermissionDenied { .. } | ObjectStoreError::Unauthenticated { .. } => {
            StorageError::PermissionDenied(format!("{}: {}", path, err))
        }
        ObjectStoreError::InvalidPath { .. } => {
            StorageError::InvalidPath(format!("{}: {}", path, err))
        }
        // the client already retried transient failures; what surfaces here is final
        _ => StorageError::Backend(format!("{}: {}", path, err)),
    }
}

/// Header-safe form of a metadata value: printable ASCII passes through,
/// anything else (and `%` itself) is percent-encoded.
fn encode_value(value: &str) -> Cow<'_, str> {
    let header_safe = value.bytes().all(|b| (0x20..0x7f).contains(&b))
        && !value.contains('%')
        && value.trim() == value;
    if header_safe {
        Cow::Borrowed(value)
    } else {
        urlencoding::encode(value)
    }
}

fn decode_value(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

fn to_attributes(content_type: String, metadata: &BTreeMap<String, String>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, content_type.into());
    for (key, value) in metadata {
        attributes.insert(
            Attribute::Metadata(Cow::Owned(key.clone())),
            encode_value(value).into_owned().into(),
        );
    }
    attributes
}

/// Content type and caller metadata carried by `attributes`.
fn from_attributes(attributes: &Attributes) -> (String, BTreeMap<String, String>) {
    let mut content_type = None;
    let mut metadata = BTreeMap::new();
    for (attribute, value) in attributes.iter() {
        let value: &str = value.as_ref();
        match attribute {
            Attribute::ContentType => content_type = Some(value.to_string()),
            Attribute::Metadata(key) if !key.to_ascii_lowercase().starts_with(PROVIDER_PREFIX) => {
                metadata.insert(key.to_string(), decode_value(value));
            }
            _ => {}
        }
    }
    (
        content_type.unwrap_or_else(|| BASE_CONTENT_TYPE.to_string()),
        metadata,
    )
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn save(&self, asset: &dyn MediaAsset, path: &str) -> StorageResult<bool> {
        let entity = asset.entity();
        let Some(content) = entity.content() else {
            tracing::warn!(key = %path, name = %entity.name, "Refusing to save media without content");
            return Ok(false);
        };
        asset.validate()?;

        let location = location(path)?;
        let encoded = self.codec.encode(asset);
        let size = content.len();
        let options = PutOptions {
            attributes: to_attributes(encoded.content_type.clone(), &encoded.metadata),
            ..Default::default()
        };

        let start = std::time::Instant::now();

        self.store
            .put_opts(&location, PutPayload::from(content.clone()), options)
            .await
            .map_err(|e| self.log_failure("save", path, start, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            content_type = %encoded.content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object save successful"
        );

        Ok(true)
    }

    async fn load(
        &self,
        path: &str,
        with_content: bool,
    ) -> StorageResult<Option<Box<dyn MediaAsset>>> {
        let location = location(path)?;
        let start = std::time::Instant::now();

        // A full GET returns attributes and payload of the same object version.
        let options = GetOptions {
            head: !with_content,
            ..Default::default()
        };
        let result = match self.store.get_opts(&location, options).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(self.log_failure("load", path, start, e)),
        };

        let (content_type, metadata) = from_attributes(&result.attributes);
        let common = CommonFields::resolve(
            name_from_path(path),
            result.meta.size,
            &metadata,
            result.meta.last_modified,
        );
        let mut asset = self.codec.decode(&content_type, &metadata, common);

        if with_content {
            let bytes = result
                .bytes()
                .await
                .map_err(|e| self.log_failure("load", path, start, e))?;
            asset.entity_mut().set_content(bytes);
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            kind = asset.kind_name(),
            with_content,
            size_bytes = asset.entity().size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object load successful"
        );

        Ok(Some(asset))
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let location = location(path)?;
        let start = std::time::Instant::now();

        // Deleting a missing key succeeds on S3, so ask first.
        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(self.log_failure("delete", path, start, e)),
        }

        match self.store.delete(&location).await {
            Ok(()) => {}
            Err(ObjectStoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(self.log_failure("delete", path, start, e)),
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(true)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = location(path)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_error(path, e)),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
