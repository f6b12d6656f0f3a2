use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entity::MediaEntity;
use crate::codec::format_timestamp;
use crate::error::{ProcessingError, ValidationError};
use crate::processing::{ProcessingOutcome, ProcessingPipeline};

/// A typed attribute value, as exposed by [`MediaAsset::specific_metadata`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Float(f64),
    Unsigned(u64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Display for MetadataValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(value) => f.write_str(value),
            // f64's Display is the shortest string that parses back to the same value
            MetadataValue::Float(value) => write!(f, "{}", value),
            MetadataValue::Unsigned(value) => write!(f, "{}", value),
            MetadataValue::Bool(value) => write!(f, "{}", value),
            MetadataValue::Timestamp(value) => f.write_str(&format_timestamp(*value)),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Unsigned(u64::from(value))
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        MetadataValue::Unsigned(value)
    }
}

/// A media asset: the common [`MediaEntity`] record plus variant-specific attributes.
///
/// Variants are discovered at load time from the content type, so backends hand
/// out `Box<dyn MediaAsset>`; use [`downcast_ref`](trait.MediaAsset.html#method.downcast_ref)
/// to get the concrete type back.
pub trait MediaAsset: Any + Send + Sync + fmt::Debug {
    fn entity(&self) -> &MediaEntity;

    fn entity_mut(&mut self) -> &mut MediaEntity;

    /// Type name used in `info()` and `Display` (e.g. "AudioAsset").
    fn kind_name(&self) -> &'static str;

    /// `<family>/<subtype>` under which this asset is stored.
    fn content_type(&self) -> String;

    /// Typed fields as a generic map. Absent optional fields are omitted.
    fn specific_metadata(&self) -> BTreeMap<String, MetadataValue>;

    /// Every metadata key this variant owns, including optional ones.
    /// `extra_metadata` must not use them.
    fn typed_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(&self) -> Result<(), ValidationError>;

    /// Run the variant's processing strategy from `pipeline`, if one is registered.
    fn process(&self, pipeline: &ProcessingPipeline) -> Result<ProcessingOutcome, ProcessingError>;

    fn as_any(&self) -> &dyn Any;

    /// General information about the asset: common fields, type, and specific metadata.
    fn info(&self) -> BTreeMap<String, MetadataValue> {
        let entity = self.entity();
        let mut info = BTreeMap::new();
        info.insert("name".to_string(), MetadataValue::from(entity.name.as_str()));
        info.insert("size".to_string(), MetadataValue::Unsigned(entity.size()));
        info.insert("owner".to_string(), MetadataValue::from(entity.owner.as_str()));
        info.insert("created_at".to_string(), MetadataValue::Timestamp(entity.created_at));
        info.insert("type".to_string(), MetadataValue::from(self.kind_name()));
        info.insert("has_content".to_string(), MetadataValue::Bool(entity.has_content()));
        info.extend(self.specific_metadata());
        info
    }
}

impl dyn MediaAsset {
    pub fn downcast_ref<T: MediaAsset>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: MediaAsset>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl Display for dyn MediaAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        describe(self, f)
    }
}

pub(crate) fn describe(asset: &dyn MediaAsset, f: &mut Formatter<'_>) -> fmt::Result {
    let entity = asset.entity();
    write!(
        f,
        "{}(name='{}', size={}, owner='{}')",
        asset.kind_name(),
        entity.name,
        entity.size(),
        entity.owner
    )
}
