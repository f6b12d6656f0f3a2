use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use super::entity::MediaEntity;
use super::media::{describe, MediaAsset, MetadataValue};
use crate::codec::{keys, PHOTO_SUBTYPE};
use crate::error::{ProcessingError, ValidationError};
use crate::processing::{ProcessingOutcome, ProcessingPipeline};
use crate::validation::{validate_extra_keys, validate_resolution};

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAsset {
    pub entity: MediaEntity,
    /// "WxH", e.g. "6000x4000".
    pub resolution: String,
    pub camera_model: Option<String>,
}

impl PhotoAsset {
    pub fn new(
        entity: MediaEntity,
        resolution: impl Into<String>,
        camera_model: Option<String>,
    ) -> Result<Self, ValidationError> {
        let photo = Self {
            entity,
            resolution: resolution.into(),
            camera_model,
        };
        photo.validate()?;
        Ok(photo)
    }
}

impl MediaAsset for PhotoAsset {
    fn entity(&self) -> &MediaEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut MediaEntity {
        &mut self.entity
    }

    fn kind_name(&self) -> &'static str {
        "PhotoAsset"
    }

    // Photos carry no codec field, so the subtype is a placeholder rather
    // than a guessed image format.
    fn content_type(&self) -> String {
        format!("image/{}", PHOTO_SUBTYPE)
    }

    fn specific_metadata(&self) -> BTreeMap<String, MetadataValue> {
        let mut metadata = BTreeMap::from([(
            keys::RESOLUTION.to_string(),
            MetadataValue::from(self.resolution.as_str()),
        )]);
        if let Some(camera_model) = &self.camera_model {
            metadata.insert(
                keys::CAMERA_MODEL.to_string(),
                MetadataValue::from(camera_model.as_str()),
            );
        }
        metadata
    }

    fn typed_keys(&self) -> &'static [&'static str] {
        &[keys::RESOLUTION, keys::CAMERA_MODEL]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.entity.validate()?;
        validate_extra_keys(&self.entity.extra_metadata, self.typed_keys())?;
        validate_resolution(&self.resolution)?;
        Ok(())
    }

    fn process(&self, pipeline: &ProcessingPipeline) -> Result<ProcessingOutcome, ProcessingError> {
        pipeline.run(self, pipeline.photo_processor())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for PhotoAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        describe(self, f)
    }
}
