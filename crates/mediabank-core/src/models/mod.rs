//! Media entity model
//!
//! The base [`MediaEntity`] record, the [`MediaAsset`] trait every variant
//! implements, and the three known variants.

mod audio;
mod entity;
mod media;
mod photo;
mod video;

pub use audio::AudioAsset;
pub use entity::MediaEntity;
pub use media::{MediaAsset, MetadataValue};
pub use photo::PhotoAsset;
pub use video::VideoAsset;
