use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use super::entity::MediaEntity;
use super::media::{describe, MediaAsset, MetadataValue};
use crate::codec::keys;
use crate::error::{ProcessingError, ValidationError};
use crate::processing::{ProcessingOutcome, ProcessingPipeline};
use crate::validation::{
    validate_codec, validate_extra_keys, validate_non_negative, validate_resolution,
};

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub entity: MediaEntity,
    /// Seconds.
    pub duration: f64,
    /// "WxH", e.g. "1920x1080".
    pub resolution: String,
    /// e.g. "h264", "av1"; stored as the content-type subtype.
    pub codec: String,
    /// Frames per second. 0 means unknown (what decode yields for missing metadata).
    pub fps: f64,
}

impl VideoAsset {
    pub fn new(
        entity: MediaEntity,
        duration: f64,
        resolution: impl Into<String>,
        codec: impl Into<String>,
        fps: f64,
    ) -> Result<Self, ValidationError> {
        let video = Self {
            entity,
            duration,
            resolution: resolution.into(),
            codec: codec.into(),
            fps,
        };
        video.validate()?;
        Ok(video)
    }
}

impl MediaAsset for VideoAsset {
    fn entity(&self) -> &MediaEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut MediaEntity {
        &mut self.entity
    }

    fn kind_name(&self) -> &'static str {
        "VideoAsset"
    }

    fn content_type(&self) -> String {
        format!("video/{}", self.codec)
    }

    fn specific_metadata(&self) -> BTreeMap<String, MetadataValue> {
        BTreeMap::from([
            (keys::DURATION.to_string(), MetadataValue::from(self.duration)),
            (keys::RESOLUTION.to_string(), MetadataValue::from(self.resolution.as_str())),
            (keys::CODEC.to_string(), MetadataValue::from(self.codec.as_str())),
            (keys::FPS.to_string(), MetadataValue::from(self.fps)),
        ])
    }

    fn typed_keys(&self) -> &'static [&'static str] {
        &[keys::DURATION, keys::RESOLUTION, keys::CODEC, keys::FPS]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.entity.validate()?;
        validate_extra_keys(&self.entity.extra_metadata, self.typed_keys())?;
        validate_non_negative(keys::DURATION, self.duration)?;
        validate_non_negative(keys::FPS, self.fps)?;
        validate_resolution(&self.resolution)?;
        validate_codec(&self.codec)?;
        Ok(())
    }

    fn process(&self, pipeline: &ProcessingPipeline) -> Result<ProcessingOutcome, ProcessingError> {
        pipeline.run(self, pipeline.video_processor())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for VideoAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        describe(self, f)
    }
}
