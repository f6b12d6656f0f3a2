//! Processing hooks
//!
//! The core does not transform media itself. Each variant's `process` looks up
//! the strategy registered for its type in a [`ProcessingPipeline`] and runs it,
//! emitting progress notifications either way. With nothing registered,
//! processing is a no-op that reports `Skipped`.

use std::sync::Arc;

use crate::error::ProcessingError;
use crate::models::{AudioAsset, MediaAsset, MediaEntity, PhotoAsset, VideoAsset};

/// Variant-specific transform (normalization, resizing, frame extraction, ...).
pub trait AssetProcessor<A>: Send + Sync {
    fn process(&self, asset: &A) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Started,
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingEvent {
    pub name: String,
    pub kind: &'static str,
    pub stage: ProcessingStage,
}

/// Receives progress notifications.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProcessingEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOutcome {
    Processed,
    Skipped,
}

/// Strategies per variant plus an optional progress listener.
#[derive(Clone, Default)]
pub struct ProcessingPipeline {
    audio: Option<Arc<dyn AssetProcessor<AudioAsset>>>,
    photo: Option<Arc<dyn AssetProcessor<PhotoAsset>>>,
    video: Option<Arc<dyn AssetProcessor<VideoAsset>>>,
    generic: Option<Arc<dyn AssetProcessor<MediaEntity>>>,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio_processor(mut self, processor: Arc<dyn AssetProcessor<AudioAsset>>) -> Self {
        self.audio = Some(processor);
        self
    }

    pub fn with_photo_processor(mut self, processor: Arc<dyn AssetProcessor<PhotoAsset>>) -> Self {
        self.photo = Some(processor);
        self
    }

    pub fn with_video_processor(mut self, processor: Arc<dyn AssetProcessor<VideoAsset>>) -> Self {
        self.video = Some(processor);
        self
    }

    pub fn with_generic_processor(
        mut self,
        processor: Arc<dyn AssetProcessor<MediaEntity>>,
    ) -> Self {
        self.generic = Some(processor);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn audio_processor(&self) -> Option<&dyn AssetProcessor<AudioAsset>> {
        self.audio.as_deref()
    }

    pub fn photo_processor(&self) -> Option<&dyn AssetProcessor<PhotoAsset>> {
        self.photo.as_deref()
    }

    pub fn video_processor(&self) -> Option<&dyn AssetProcessor<VideoAsset>> {
        self.video.as_deref()
    }

    pub fn generic_processor(&self) -> Option<&dyn AssetProcessor<MediaEntity>> {
        self.generic.as_deref()
    }

    /// Run `processor` on `asset`, notifying the listener of each stage.
    ///
    /// Public so that asset kinds defined outside this crate can reuse it.
    pub fn run<A: MediaAsset>(
        &self,
        asset: &A,
        processor: Option<&dyn AssetProcessor<A>>,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let name = asset.entity().name.clone();
        let kind = asset.kind_name();
        self.notify(&name, kind, ProcessingStage::Started);

        let Some(processor) = processor else {
            self.notify(&name, kind, ProcessingStage::Skipped);
            return Ok(ProcessingOutcome::Skipped);
        };

        match processor.process(asset) {
            Ok(()) => {
                self.notify(&name, kind, ProcessingStage::Completed);
                Ok(ProcessingOutcome::Processed)
            }
            Err(source) => {
                tracing::error!(name = %name, kind = kind, error = %source, "Processing failed");
                self.notify(&name, kind, ProcessingStage::Failed);
                Err(ProcessingError::FailedWithSource { name, source })
            }
        }
    }

    fn notify(&self, name: &str, kind: &'static str, stage: ProcessingStage) {
        tracing::debug!(name = %name, kind = kind, stage = ?stage, "Processing progress");
        if let Some(listener) = &self.listener {
            listener.on_event(&ProcessingEvent {
                name: name.to_string(),
                kind,
                stage,
            });
        }
    }
}
