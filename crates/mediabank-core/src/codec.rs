//! Metadata codec
//!
//! Projects a [`MediaAsset`] onto what every backend can store: one content
//! type string and a flat string-to-string metadata map. Decoding goes the
//! other way and picks the variant from the content-type family through a
//! registry of [`AssetDecoder`]s, so new asset kinds plug in without touching
//! the existing decoders.
//!
//! Decoding never fails. Missing or malformed numeric fields decode to 0,
//! a missing resolution to `unknown`, and an unknown family to the base
//! [`MediaEntity`]. Keys that are neither typed fields nor reserved
//! (`owner`, `created_at`) come back in `extra_metadata`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AudioAsset, MediaAsset, MediaEntity, PhotoAsset, VideoAsset};
use crate::validation::UNKNOWN_RESOLUTION;

/// Metadata keys of the wire contract.
pub mod keys {
    pub const OWNER: &str = "owner";
    pub const CREATED_AT: &str = "created_at";
    pub const DURATION: &str = "duration";
    pub const BITRATE: &str = "bitrate";
    pub const CODEC: &str = "codec";
    pub const RESOLUTION: &str = "resolution";
    pub const CAMERA_MODEL: &str = "camera_model";
    pub const FPS: &str = "fps";

    /// Keys carrying common fields; never part of `extra_metadata`.
    pub const RESERVED: [&str; 2] = [OWNER, CREATED_AT];

    /// Object-store provider headers; dropped on read, so never caller data.
    pub const PROVIDER_PREFIX: &str = "x-amz-";
}

/// Content type of the base entity and of objects without one.
pub const BASE_CONTENT_TYPE: &str = "application/octet-stream";
/// Subtype stored for photos, which have no codec field.
pub const PHOTO_SUBTYPE: &str = "unknown";
/// Owner recorded when stored metadata has none.
pub const UNKNOWN_OWNER: &str = "unknown";

pub const AUDIO_FAMILY: &str = "audio";
pub const VIDEO_FAMILY: &str = "video";
pub const IMAGE_FAMILY: &str = "image";

/// What a backend persists besides the content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncodedMedia {
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Fields every backend knows about an object regardless of its variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonFields {
    pub name: String,
    pub size: u64,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl CommonFields {
    /// Common fields for a stored object.
    ///
    /// `owner` and `created_at` come from the metadata when present and
    /// parseable; otherwise `owner` is `unknown` and `created_at` falls back to
    /// the backend's last-modified time.
    pub fn resolve(
        name: impl Into<String>,
        size: u64,
        metadata: &BTreeMap<String, String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let owner = metadata
            .get(keys::OWNER)
            .filter(|owner| !owner.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string());
        let created_at = metadata
            .get(keys::CREATED_AT)
            .and_then(|value| parse_timestamp(value))
            .unwrap_or(last_modified);

        Self {
            name: name.into(),
            size,
            owner,
            created_at,
        }
    }
}

impl From<&MediaEntity> for CommonFields {
    fn from(entity: &MediaEntity) -> Self {
        Self {
            name: entity.name.clone(),
            size: entity.size(),
            owner: entity.owner.clone(),
            created_at: entity.created_at,
        }
    }
}

/// ISO-8601 / RFC 3339 in UTC with a `Z` suffix; sub-second precision is kept.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Split `family/subtype[; params]` into a lowercase family and a trimmed subtype.
///
/// `None` unless both parts are non-empty.
pub fn split_content_type(content_type: &str) -> Option<(String, &str)> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let (family, subtype) = essence.split_once('/')?;
    let (family, subtype) = (family.trim(), subtype.trim());
    if family.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((family.to_ascii_lowercase(), subtype))
}

/// Metadata left to decode. Decoders take the keys they own; the rest
/// becomes `extra_metadata`.
#[derive(Debug, Clone, Default)]
pub struct MetadataFields {
    remaining: BTreeMap<String, String>,
}

impl MetadataFields {
    pub fn new(metadata: BTreeMap<String, String>) -> Self {
        Self { remaining: metadata }
    }

    pub fn take_text(&mut self, key: &str) -> Option<String> {
        self.remaining.remove(key)
    }

    /// Remove `key` and parse it as a finite, non-negative number; 0 otherwise.
    pub fn take_f64(&mut self, key: &str) -> f64 {
        self.remaining
            .remove(key)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .unwrap_or(0.0)
    }

    /// Remove `key` and parse it as an unsigned integer; 0 otherwise.
    ///
    /// Whole-valued floats ("320.0") are accepted.
    pub fn take_u32(&mut self, key: &str) -> u32 {
        let Some(value) = self.remaining.remove(key) else {
            return 0;
        };
        let value = value.trim();
        if let Ok(parsed) = value.parse::<u32>() {
            return parsed;
        }
        match value.parse::<f64>() {
            Ok(parsed) if parsed.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&parsed) => {
                parsed as u32
            }
            _ => 0,
        }
    }

    pub fn discard(&mut self, key: &str) {
        self.remaining.remove(key);
    }

    pub fn into_extra(self) -> BTreeMap<String, String> {
        self.remaining
    }
}

/// Builds one variant from decoded metadata. Registered per content-type family.
pub trait AssetDecoder: Send + Sync {
    /// Lowercase content-type family this decoder owns (e.g. "audio").
    fn family(&self) -> &'static str;

    fn decode(
        &self,
        subtype: &str,
        entity: MediaEntity,
        fields: &mut MetadataFields,
    ) -> Box<dyn MediaAsset>;
}

pub struct AudioDecoder;

impl AssetDecoder for AudioDecoder {
    fn family(&self) -> &'static str {
        AUDIO_FAMILY
    }

    fn decode(
        &self,
        subtype: &str,
        entity: MediaEntity,
        fields: &mut MetadataFields,
    ) -> Box<dyn MediaAsset> {
        // the content type is authoritative for the codec
        fields.discard(keys::CODEC);
        Box::new(AudioAsset {
            entity,
            duration: fields.take_f64(keys::DURATION),
            bitrate: fields.take_u32(keys::BITRATE),
            codec: subtype.to_string(),
        })
    }
}

pub struct VideoDecoder;

impl AssetDecoder for VideoDecoder {
    fn family(&self) -> &'static str {
        VIDEO_FAMILY
    }

    fn decode(
        &self,
        subtype: &str,
        entity: MediaEntity,
        fields: &mut MetadataFields,
    ) -> Box<dyn MediaAsset> {
        fields.discard(keys::CODEC);
        Box::new(VideoAsset {
            entity,
            duration: fields.take_f64(keys::DURATION),
            resolution: fields
                .take_text(keys::RESOLUTION)
                .unwrap_or_else(|| UNKNOWN_RESOLUTION.to_string()),
            codec: subtype.to_string(),
            fps: fields.take_f64(keys::FPS),
        })
    }
}

pub struct PhotoDecoder;

impl AssetDecoder for PhotoDecoder {
    fn family(&self) -> &'static str {
        IMAGE_FAMILY
    }

    fn decode(
        &self,
        _subtype: &str,
        entity: MediaEntity,
        fields: &mut MetadataFields,
    ) -> Box<dyn MediaAsset> {
        Box::new(PhotoAsset {
            entity,
            resolution: fields
                .take_text(keys::RESOLUTION)
                .unwrap_or_else(|| UNKNOWN_RESOLUTION.to_string()),
            camera_model: fields.take_text(keys::CAMERA_MODEL),
        })
    }
}

/// Encoder plus the registry of decoders keyed by content-type family.
#[derive(Clone)]
pub struct MetadataCodec {
    decoders: HashMap<String, Arc<dyn AssetDecoder>>,
}

impl Default for MetadataCodec {
    /// Codec with the audio, video and image decoders registered.
    fn default() -> Self {
        Self::empty()
            .with_decoder(Arc::new(AudioDecoder))
            .with_decoder(Arc::new(VideoDecoder))
            .with_decoder(Arc::new(PhotoDecoder))
    }
}

impl std::fmt::Debug for MetadataCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCodec")
            .field("families", &self.families())
            .finish()
    }
}

impl MetadataCodec {
    /// Codec without decoders: everything decodes to the base entity.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register `decoder` for its family, returning the one it replaces.
    pub fn register(&mut self, decoder: Arc<dyn AssetDecoder>) -> Option<Arc<dyn AssetDecoder>> {
        self.decoders
            .insert(decoder.family().to_ascii_lowercase(), decoder)
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn AssetDecoder>) -> Self {
        self.register(decoder);
        self
    }

    /// Registered families, sorted.
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        families.sort_unstable();
        families
    }

    pub fn encode(&self, asset: &dyn MediaAsset) -> EncodedMedia {
        encode(asset)
    }

    pub fn decode(
        &self,
        content_type: &str,
        metadata: &BTreeMap<String, String>,
        common: CommonFields,
    ) -> Box<dyn MediaAsset> {
        let mut fields = MetadataFields::new(metadata.clone());
        for key in keys::RESERVED {
            fields.discard(key);
        }

        let entity =
            MediaEntity::metadata_only(common.name, common.size, common.owner, common.created_at);

        let decoder = split_content_type(content_type)
            .and_then(|(family, subtype)| self.decoders.get(&family).map(|d| (d, subtype)));

        let mut asset = match decoder {
            Some((decoder, subtype)) => decoder.decode(subtype, entity, &mut fields),
            None => {
                tracing::debug!(content_type = %content_type, "No decoder for content type, using base entity");
                Box::new(entity)
            }
        };
        asset.entity_mut().extra_metadata = fields.into_extra();
        asset
    }
}

static DEFAULT_CODEC: LazyLock<MetadataCodec> = LazyLock::new(MetadataCodec::default);

/// Encode `asset` into its content type and metadata map.
///
/// Extra metadata is written first, then `owner` and `created_at`, then the
/// typed fields, so typed values win over colliding extra keys. Extra keys in
/// the variant's typed namespace are dropped even when the typed value is
/// absent (a `None` camera model), so they cannot decode as typed fields.
pub fn encode(asset: &dyn MediaAsset) -> EncodedMedia {
    let entity = asset.entity();
    let mut metadata = entity.extra_metadata.clone();
    for key in keys::RESERVED.iter().chain(asset.typed_keys()) {
        metadata.remove(*key);
    }
    metadata.insert(keys::OWNER.to_string(), entity.owner.clone());
    metadata.insert(keys::CREATED_AT.to_string(), format_timestamp(entity.created_at));
    for (key, value) in asset.specific_metadata() {
        metadata.insert(key, value.to_string());
    }

    EncodedMedia {
        content_type: asset.content_type(),
        metadata,
    }
}

/// Decode with the default registry (audio, video, image).
pub fn decode(
    content_type: &str,
    metadata: &BTreeMap<String, String>,
    common: CommonFields,
) -> Box<dyn MediaAsset> {
    DEFAULT_CODEC.decode(content_type, metadata, common)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap()
    }

    fn entity(name: &str) -> MediaEntity {
        MediaEntity::new(name, "alice")
            .with_created_at(created())
            .with_content(b"payload".to_vec())
    }

    fn round_trip(asset: &dyn MediaAsset) -> Box<dyn MediaAsset> {
        let encoded = encode(asset);
        decode(
            &encoded.content_type,
            &encoded.metadata,
            CommonFields::from(asset.entity()),
        )
    }

    #[test]
    fn test_audio_round_trip() {
        let audio = AudioAsset::new(entity("a.mp3").with_extra("album", "X"), 120.5, 320, "mp3")
            .unwrap();
        let decoded = round_trip(&audio);
        let decoded = decoded.downcast_ref::<AudioAsset>().unwrap();

        assert_eq!(decoded.duration, 120.5);
        assert_eq!(decoded.bitrate, 320);
        assert_eq!(decoded.codec, "mp3");
        assert_eq!(decoded.entity.extra_metadata, audio.entity.extra_metadata);
        assert_eq!(decoded.entity.owner, "alice");
        assert_eq!(decoded.entity.created_at, created());
        assert_eq!(decoded.entity.size(), 7);
        assert!(decoded.entity.content().is_none());
    }

    #[test]
    fn test_photo_round_trip() {
        let with_camera =
            PhotoAsset::new(entity("p.jpg"), "6000x4000", Some("X-T4".to_string())).unwrap();
        let decoded = round_trip(&with_camera);
        let decoded = decoded.downcast_ref::<PhotoAsset>().unwrap();
        assert_eq!(decoded.resolution, "6000x4000");
        assert_eq!(decoded.camera_model.as_deref(), Some("X-T4"));
        assert!(decoded.entity.extra_metadata.is_empty());

        let without_camera = PhotoAsset::new(entity("p.jpg"), "640x480", None).unwrap();
        let decoded = round_trip(&without_camera);
        let decoded = decoded.downcast_ref::<PhotoAsset>().unwrap();
        assert_eq!(decoded.camera_model, None);
    }

    #[test]
    fn test_absent_typed_field_is_not_filled_from_extra() {
        let mut photo = PhotoAsset::new(entity("p.jpg"), "640x480", None).unwrap();
        photo
            .entity
            .extra_metadata
            .insert("camera_model".to_string(), "Leica".to_string());

        let encoded = encode(&photo);
        assert!(!encoded.metadata.contains_key("camera_model"));

        let decoded = round_trip(&photo);
        let decoded = decoded.downcast_ref::<PhotoAsset>().unwrap();
        assert_eq!(decoded.camera_model, None);
        assert!(decoded.entity.extra_metadata.is_empty());

        // and saving such an asset is refused up front
        assert_eq!(
            photo.validate(),
            Err(crate::ValidationError::ReservedMetadataKey("camera_model".to_string()))
        );
    }

    #[test]
    fn test_video_round_trip() {
        let video = VideoAsset::new(
            entity("clip.mkv").with_extra("director", "Varda"),
            5400.25,
            "3840x2160",
            "av1",
            23.976,
        )
        .unwrap();
        let decoded = round_trip(&video);
        let decoded = decoded.downcast_ref::<VideoAsset>().unwrap();

        let mut expected = video.clone();
        expected.entity.clear_content();
        assert_eq!(decoded, &expected);
    }

    #[test]
    fn test_base_entity_round_trip() {
        let base = entity("blob.bin").with_extra("duration", "not typed here");
        let decoded = round_trip(&base);
        let decoded = decoded.downcast_ref::<MediaEntity>().unwrap();
        assert_eq!(decoded.extra_metadata, base.extra_metadata);
    }

    #[test]
    fn test_encode_wire_contract() {
        let audio = AudioAsset::new(entity("a.mp3"), 120.5, 320, "mp3").unwrap();
        let encoded = encode(&audio);

        assert_eq!(encoded.content_type, "audio/mp3");
        assert_eq!(encoded.metadata["owner"], "alice");
        assert_eq!(encoded.metadata["created_at"], "2024-03-01T12:30:15Z");
        assert_eq!(encoded.metadata["duration"], "120.5");
        assert_eq!(encoded.metadata["bitrate"], "320");
        assert_eq!(encoded.metadata["codec"], "mp3");
        assert_eq!(encoded.metadata.len(), 5);
    }

    #[test]
    fn test_typed_fields_win_over_extra_keys() {
        let mut audio = AudioAsset::new(entity("a.mp3"), 60.0, 128, "aac").unwrap();
        audio.entity.extra_metadata.insert("bitrate".to_string(), "9999".to_string());
        audio.entity.extra_metadata.insert("owner".to_string(), "mallory".to_string());

        let encoded = encode(&audio);
        assert_eq!(encoded.metadata["bitrate"], "128");
        assert_eq!(encoded.metadata["owner"], "alice");

        let decoded = round_trip(&audio);
        let decoded = decoded.downcast_ref::<AudioAsset>().unwrap();
        assert_eq!(decoded.bitrate, 128);
        assert!(decoded.entity.extra_metadata.is_empty());
    }

    #[test]
    fn test_codec_comes_from_content_type() {
        let metadata = BTreeMap::from([("codec".to_string(), "wav".to_string())]);
        let common = CommonFields::resolve("a", 0, &metadata, created());
        let decoded = decode("audio/flac", &metadata, common);
        let decoded = decoded.downcast_ref::<AudioAsset>().unwrap();
        assert_eq!(decoded.codec, "flac");
        assert!(decoded.entity.extra_metadata.is_empty());
    }

    #[test]
    fn test_unknown_family_decodes_to_base_entity() {
        let metadata = BTreeMap::from([
            ("owner".to_string(), "bob".to_string()),
            ("pages".to_string(), "12".to_string()),
        ]);
        for content_type in ["application/pdf", "", "garbage", "/mp3"] {
            let common = CommonFields::resolve("doc", 10, &metadata, created());
            let decoded = decode(content_type, &metadata, common);
            assert_eq!(decoded.kind_name(), "MediaEntity");
            assert!(decoded.specific_metadata().is_empty());
            assert_eq!(decoded.entity().owner, "bob");
            assert_eq!(decoded.entity().extra_metadata["pages"], "12");
            assert!(!decoded.entity().extra_metadata.contains_key("owner"));
        }
    }

    #[test]
    fn test_missing_and_malformed_numbers_default_to_zero() {
        let metadata = BTreeMap::from([
            ("duration".to_string(), "long".to_string()),
            ("resolution".to_string(), "1280x720".to_string()),
        ]);
        let common = CommonFields::resolve("v", 0, &metadata, created());
        let decoded = decode("video/h264", &metadata, common);
        let decoded = decoded.downcast_ref::<VideoAsset>().unwrap();

        assert_eq!(decoded.duration, 0.0);
        assert_eq!(decoded.fps, 0.0);
        assert_eq!(decoded.resolution, "1280x720");
        // a malformed typed key is consumed, not leaked into extras
        assert!(decoded.entity.extra_metadata.is_empty());
    }

    #[test]
    fn test_numeric_parsing_edges() {
        let mut fields = MetadataFields::new(BTreeMap::from([
            ("a".to_string(), " 320 ".to_string()),
            ("b".to_string(), "320.0".to_string()),
            ("c".to_string(), "-5".to_string()),
            ("d".to_string(), "NaN".to_string()),
            ("e".to_string(), "1e3".to_string()),
        ]));
        assert_eq!(fields.take_u32("a"), 320);
        assert_eq!(fields.take_u32("b"), 320);
        assert_eq!(fields.take_u32("c"), 0);
        assert_eq!(fields.take_f64("d"), 0.0);
        assert_eq!(fields.take_f64("e"), 1000.0);
        assert_eq!(fields.take_f64("missing"), 0.0);
        assert!(fields.into_extra().is_empty());
    }

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(split_content_type("Audio/MP3"), Some(("audio".to_string(), "MP3")));
        assert_eq!(
            split_content_type("audio/aac; rate=44100"),
            Some(("audio".to_string(), "aac"))
        );
        assert_eq!(split_content_type("audio"), None);
        assert_eq!(split_content_type(""), None);
        assert_eq!(split_content_type("audio/"), None);
        assert_eq!(split_content_type("video/ ; rate=1"), None);

        // an empty subtype would make an empty, unsavable codec
        for content_type in ["audio/", "video/"] {
            let common = CommonFields::resolve("a", 0, &BTreeMap::new(), created());
            let decoded = decode(content_type, &BTreeMap::new(), common);
            assert_eq!(decoded.kind_name(), "MediaEntity");
            assert!(decoded.validate().is_ok());
        }

        let common = CommonFields::resolve("a", 0, &BTreeMap::new(), created());
        let decoded = decode("AUDIO/mp3", &BTreeMap::new(), common);
        assert_eq!(decoded.kind_name(), "AudioAsset");
    }

    #[test]
    fn test_common_fields_fallbacks() {
        let fallback = created();
        let common = CommonFields::resolve("x", 3, &BTreeMap::new(), fallback);
        assert_eq!(common.owner, UNKNOWN_OWNER);
        assert_eq!(common.created_at, fallback);

        let metadata = BTreeMap::from([
            ("owner".to_string(), "carol".to_string()),
            ("created_at".to_string(), "2023-01-02T03:04:05.123456".to_string()),
        ]);
        let common = CommonFields::resolve("x", 3, &metadata, fallback);
        assert_eq!(common.owner, "carol");
        assert_eq!(format_timestamp(common.created_at), "2023-01-02T03:04:05.123456Z");

        let metadata = BTreeMap::from([("created_at".to_string(), "yesterday".to_string())]);
        let common = CommonFields::resolve("x", 3, &metadata, fallback);
        assert_eq!(common.created_at, fallback);
    }

    #[test]
    fn test_timestamp_round_trip_keeps_precision() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&format_timestamp(now)), Some(now));
        assert_eq!(
            parse_timestamp("2024-03-01T14:30:15+02:00"),
            Some(created())
        );
    }

    struct DocumentDecoder;

    impl AssetDecoder for DocumentDecoder {
        fn family(&self) -> &'static str {
            "text"
        }

        fn decode(
            &self,
            _subtype: &str,
            mut entity: MediaEntity,
            fields: &mut MetadataFields,
        ) -> Box<dyn MediaAsset> {
            entity.name = format!("doc:{}", entity.name);
            fields.discard("pages");
            Box::new(entity)
        }
    }

    #[test]
    fn test_registry_accepts_new_families() {
        let codec = MetadataCodec::default().with_decoder(Arc::new(DocumentDecoder));
        assert_eq!(codec.families(), vec!["audio", "image", "text", "video"]);

        let metadata = BTreeMap::from([("pages".to_string(), "3".to_string())]);
        let common = CommonFields::resolve("notes.txt", 0, &metadata, created());
        let decoded = codec.decode("text/plain", &metadata, common);
        assert_eq!(decoded.entity().name, "doc:notes.txt");
        assert!(decoded.entity().extra_metadata.is_empty());

        let empty = MetadataCodec::empty();
        let common = CommonFields::resolve("a.mp3", 0, &BTreeMap::new(), created());
        assert_eq!(empty.decode("audio/mp3", &BTreeMap::new(), common).kind_name(), "MediaEntity");
    }
}
