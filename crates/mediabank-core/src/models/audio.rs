use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use super::entity::MediaEntity;
use super::media::{describe, MediaAsset, MetadataValue};
use crate::codec::keys;
use crate::error::{ProcessingError, ValidationError};
use crate::processing::{ProcessingOutcome, ProcessingPipeline};
use crate::validation::{validate_codec, validate_extra_keys, validate_non_negative};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    pub entity: MediaEntity,
    /// Seconds.
    pub duration: f64,
    /// kbps.
    pub bitrate: u32,
    /// e.g. "mp3", "aac"; stored as the content-type subtype.
    pub codec: String,
}

impl AudioAsset {
    pub fn new(
        entity: MediaEntity,
        duration: f64,
        bitrate: u32,
        codec: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let audio = Self {
            entity,
            duration,
            bitrate,
            codec: codec.into(),
        };
        audio.validate()?;
        Ok(audio)
    }
}

impl MediaAsset for AudioAsset {
    fn entity(&self) -> &MediaEntity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut MediaEntity {
        &mut self.entity
    }

    fn kind_name(&self) -> &'static str {
        "AudioAsset"
    }

    fn content_type(&self) -> String {
        format!("audio/{}", self.codec)
    }

    fn specific_metadata(&self) -> BTreeMap<String, MetadataValue> {
        BTreeMap::from([
            (keys::DURATION.to_string(), MetadataValue::from(self.duration)),
            (keys::BITRATE.to_string(), MetadataValue::from(self.bitrate)),
            (keys::CODEC.to_string(), MetadataValue::from(self.codec.as_str())),
        ])
    }

    fn typed_keys(&self) -> &'static [&'static str] {
        &[keys::DURATION, keys::BITRATE, keys::CODEC]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.entity.validate()?;
        validate_extra_keys(&self.entity.extra_metadata, self.typed_keys())?;
        validate_non_negative(keys::DURATION, self.duration)?;
        validate_codec(&self.codec)?;
        Ok(())
    }

    fn process(&self, pipeline: &ProcessingPipeline) -> Result<ProcessingOutcome, ProcessingError> {
        pipeline.run(self, pipeline.audio_processor())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for AudioAsset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        describe(self, f)
    }
}
