#![cfg(all(feature = "storage-local", feature = "storage-s3"))]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mediabank_core::{AudioAsset, MediaAsset, MediaEntity, PhotoAsset, VideoAsset};
use mediabank_storage::{LocalStorage, ObjectStorage, Storage, StorageBackend};
use object_store::memory::InMemory;
use tempfile::TempDir;

struct Backend {
    storage: Arc<dyn Storage>,
    _dir: Option<TempDir>,
}

impl Backend {
    fn label(&self) -> StorageBackend {
        self.storage.backend_type()
    }
}

async fn backends() -> Vec<Backend> {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStorage::new(dir.path()).await.unwrap();
    let object = ObjectStorage::with_store(Arc::new(InMemory::new()), "media");

    vec![
        Backend {
            storage: Arc::new(local),
            _dir: Some(dir),
        },
        Backend {
            storage: Arc::new(object),
            _dir: None,
        },
    ]
}

fn assert_same_asset(original: &dyn MediaAsset, loaded: &dyn MediaAsset) {
    assert_eq!(loaded.kind_name(), original.kind_name());
    assert_eq!(loaded.content_type(), original.content_type());
    assert_eq!(loaded.specific_metadata(), original.specific_metadata());
    assert_eq!(loaded.entity().extra_metadata, original.entity().extra_metadata);
    assert_eq!(loaded.entity().owner, original.entity().owner);
    assert_eq!(loaded.entity().created_at, original.entity().created_at);
    assert_eq!(loaded.entity().size(), original.entity().size());
}

#[tokio::test]
async fn test_audio_scenario() {
    for backend in backends().await {
        let storage = &backend.storage;
        let entity = MediaEntity::new("a.mp3", "alice").with_content(b"fake mp3 frames".to_vec());
        let audio = AudioAsset::new(entity, 120.5, 320, "mp3").unwrap();

        assert!(storage.save(&audio, "music/a.mp3").await.unwrap());

        let loaded = storage.load("music/a.mp3", true).await.unwrap().unwrap();
        let loaded = loaded
            .downcast_ref::<AudioAsset>()
            .unwrap_or_else(|| panic!("{}: not an AudioAsset", backend.label()));
        assert_eq!(loaded.duration, 120.5);
        assert_eq!(loaded.bitrate, 320);
        assert_eq!(loaded.codec, "mp3");
        assert_eq!(loaded.entity.name, "a.mp3");
        assert_eq!(
            loaded.entity.content().map(|c| c.to_vec()),
            Some(b"fake mp3 frames".to_vec())
        );
    }
}

#[tokio::test]
async fn test_missing_path_is_not_an_error() {
    for backend in backends().await {
        let storage = &backend.storage;
        assert!(storage.load("missing/x", true).await.unwrap().is_none());
        assert!(storage.load_metadata("missing/x").await.unwrap().is_none());
        assert!(!storage.exists("missing/x").await.unwrap());
        assert!(!storage.delete("missing/x").await.unwrap());
    }
}

#[tokio::test]
async fn test_extra_metadata_round_trip() {
    for backend in backends().await {
        let storage = &backend.storage;
        let entity = MediaEntity::new("cover.bin", "alice")
            .with_content(vec![1u8, 2, 3])
            .with_extra("album", "X")
            .with_extra("artist", "Sigur Rós / 東京 100%");

        assert!(storage.save(&entity, "albums/cover.bin").await.unwrap());

        let loaded = storage.load("albums/cover.bin", false).await.unwrap().unwrap();
        assert_eq!(loaded.entity().extra_metadata["album"], "X");
        assert_eq!(
            loaded.entity().extra_metadata["artist"],
            "Sigur Rós / 東京 100%",
            "{}",
            backend.label()
        );
        assert_same_asset(&entity, loaded.as_ref());
    }
}

#[tokio::test]
async fn test_every_variant_round_trips() {
    let created = Utc.with_ymd_and_hms(2024, 5, 17, 8, 0, 0).unwrap();
    let assets: Vec<(&str, Box<dyn MediaAsset>)> = vec![
        (
            "audio/track.flac",
            Box::new(
                AudioAsset::new(
                    MediaEntity::new("track.flac", "alice")
                        .with_created_at(created)
                        .with_content(vec![0u8; 32]),
                    241.75,
                    1411,
                    "flac",
                )
                .unwrap(),
            ),
        ),
        (
            "photos/p.jpg",
            Box::new(
                PhotoAsset::new(
                    MediaEntity::new("p.jpg", "bob")
                        .with_created_at(created)
                        .with_content(vec![0xffu8, 0xd8, 0xff])
                        .with_extra("location", "Reykjavík"),
                    "4032x3024",
                    Some("Pixel 8".to_string()),
                )
                .unwrap(),
            ),
        ),
        (
            "videos/v.webm",
            Box::new(
                VideoAsset::new(
                    MediaEntity::new("v.webm", "carol")
                        .with_created_at(created)
                        .with_content(vec![9u8; 128]),
                    5.0,
                    "1280x720",
                    "webm",
                    25.0,
                )
                .unwrap(),
            ),
        ),
        (
            "blobs/b",
            Box::new(MediaEntity::new("b", "dave").with_content(b"opaque".to_vec())),
        ),
    ];

    for backend in backends().await {
        for (path, asset) in &assets {
            assert!(backend.storage.save(asset.as_ref(), path).await.unwrap());
            let loaded = backend.storage.load(path, true).await.unwrap().unwrap();
            assert_same_asset(asset.as_ref(), loaded.as_ref());
            assert_eq!(loaded.entity().content(), asset.entity().content());
        }
    }
}

#[tokio::test]
async fn test_delete_then_exists() {
    for backend in backends().await {
        let storage = &backend.storage;
        let entity = MediaEntity::new("doc", "alice").with_content(b"x".to_vec());
        storage.save(&entity, "tmp/doc").await.unwrap();
        assert!(storage.exists("tmp/doc").await.unwrap());

        assert!(storage.delete("tmp/doc").await.unwrap());
        assert!(!storage.exists("tmp/doc").await.unwrap());
        assert!(storage.load("tmp/doc", true).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_metadata_only_load_reports_stored_size() {
    for backend in backends().await {
        let storage = &backend.storage;
        let photo = PhotoAsset::new(
            MediaEntity::new("p.png", "alice").with_content(vec![0u8; 2048]),
            "32x32",
            None,
        )
        .unwrap();
        storage.save(&photo, "p.png").await.unwrap();

        let loaded = storage.load_metadata("p.png").await.unwrap().unwrap();
        assert!(!loaded.entity().has_content());
        assert_eq!(loaded.entity().size(), 2048);
        let loaded = loaded.downcast_ref::<PhotoAsset>().unwrap();
        assert_eq!(loaded.resolution, "32x32");
        assert!(loaded.camera_model.is_none());
    }
}
