use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::media::{describe, MediaAsset, MetadataValue};
use crate::codec::BASE_CONTENT_TYPE;
use crate::error::{ProcessingError, ValidationError};
use crate::processing::{ProcessingOutcome, ProcessingPipeline};
use crate::validation::{validate_extra_keys, validate_non_empty};

/// Common record shared by every media asset.
///
/// `content` and `size` are private: whenever content is present, `size` equals
/// its length, and the only way to change content is [`set_content`](Self::set_content),
/// which updates both together. Without content (the "metadata only" state)
/// `size` keeps the last known value.
///
/// The base entity is also the variant that unknown content types decode to.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntity {
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    /// Attributes without a typed field, preserved verbatim through storage.
    pub extra_metadata: BTreeMap<String, String>,
    size: u64,
    content: Option<Bytes>,
}

impl MediaEntity {
    /// New entity without content, created now.
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            created_at: Utc::now(),
            extra_metadata: BTreeMap::new(),
            size: 0,
            content: None,
        }
    }

    /// Metadata-only entity with a known size, as reconstructed by a backend.
    pub fn metadata_only(
        name: impl Into<String>,
        size: u64,
        owner: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            created_at,
            extra_metadata: BTreeMap::new(),
            size,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Bytes>) -> Self {
        self.set_content(content);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_metadata.insert(key.into(), value.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Replace the content; `size` becomes its length.
    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        let content = content.into();
        self.size = content.len() as u64;
        self.content = Some(content);
    }

    /// Drop the content to free memory. Metadata, including `size`, survives.
    pub fn clear_content(&mut self) {
        self.content = None;
    }

    /// Take the content out, leaving the entity metadata-only.
    pub fn take_content(&mut self) -> Option<Bytes> {
        self.content.take()
    }

    /// Set the size of a metadata-only entity.
    ///
    /// Fails while content is present, since the size is then derived from it.
    pub fn set_size(&mut self, size: u64) -> Result<(), ValidationError> {
        if let Some(content) = &self.content {
            return Err(ValidationError::SizeWithContent {
                content_len: content.len() as u64,
            });
        }
        self.size = size;
        Ok(())
    }
}

impl MediaAsset for MediaEntity {
    fn entity(&self) -> &MediaEntity {
        self
    }

    fn entity_mut(&mut self) -> &mut MediaEntity {
        self
    }

    fn kind_name(&self) -> &'static str {
        "MediaEntity"
    }

    fn content_type(&self) -> String {
        BASE_CONTENT_TYPE.to_string()
    }

    fn specific_metadata(&self) -> BTreeMap<String, MetadataValue> {
        BTreeMap::new()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_non_empty("name", &self.name)?;
        validate_non_empty("owner", &self.owner)?;
        validate_extra_keys(&self.extra_metadata, &[])?;
        Ok(())
    }

    fn process(&self, pipeline: &ProcessingPipeline) -> Result<ProcessingOutcome, ProcessingError> {
        pipeline.run(self, pipeline.generic_processor())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for MediaEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        describe(self, f)
    }
}
