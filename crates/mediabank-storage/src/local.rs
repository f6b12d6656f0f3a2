use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mediabank_core::codec::BASE_CONTENT_TYPE;
use mediabank_core::{CommonFields, EncodedMedia, MediaAsset, MetadataCodec};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::traits::{name_from_path, Storage, StorageError, StorageResult};
use crate::StorageBackend;

/// First line of every object file written by this backend.
pub const OBJECT_MAGIC: &[u8] = b"MEDIABANK/1\n";

/// Local filesystem storage implementation
///
/// The object for `path` is one file, `<base>/<path>`: the [`OBJECT_MAGIC`]
/// line, the encoded content type and metadata as one line of JSON, then the
/// content bytes. The file is replaced with a single rename, so readers see
/// content and metadata from the same save. Every path is confined to the
/// base directory, including through symlinks.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    codec: MetadataCodec,
}

/// Decoded head of an object file.
struct ObjectHeader {
    encoded: EncodedMedia,
    /// Bytes before the content.
    len: u64,
    /// Content bytes already consumed while looking for the header.
    leading: Vec<u8>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/mediabank"),
    ///   created if missing
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::Config(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::Config(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalStorage {
            base_path,
            codec: MetadataCodec::default(),
        })
    }

    /// Use `codec` (e.g. with extra decoders registered) instead of the default one.
    pub fn with_codec(mut self, codec: MetadataCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a storage path to a filesystem path with security validation
    ///
    /// Rejects absolute paths and `..` components, then canonicalizes the
    /// deepest existing ancestor and checks that it is still under the base
    /// directory, so a symlink cannot lead outside either.
    async fn resolve_path(&self, path: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(path);
        let mut has_name = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_name = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(format!(
                        "{}: path escapes the storage root",
                        path
                    )));
                }
            }
        }
        if !has_name {
            return Err(StorageError::InvalidPath(format!("'{}': empty path", path)));
        }

        let full_path = self.base_path.join(relative);

        let mut ancestor = full_path.as_path();
        loop {
            match fs::canonicalize(ancestor).await {
                Ok(canonical) => {
                    if !canonical.starts_with(&self.base_path) {
                        return Err(StorageError::InvalidPath(format!(
                            "{}: path resolves outside the storage root",
                            path
                        )));
                    }
                    break;
                }
                Err(e) if is_absent(&e) => match ancestor.parent() {
                    Some(parent) => ancestor = parent,
                    None => break,
                },
                Err(e) => {
                    return Err(StorageError::from_io(
                        format!("Failed to resolve {}", full_path.display()),
                        e,
                    ))
                }
            }
        }

        Ok(full_path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::from_io(format!("Failed to create directory {}", parent.display()), e)
            })?;
        }
        Ok(())
    }

    /// Write `parts` in order to a unique temp file next to `target`, then
    /// rename it into place.
    async fn write_atomic(&self, target: &Path, parts: &[&[u8]]) -> StorageResult<()> {
        let file_name = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = target.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            for part in parts {
                file.write_all(part).await?;
            }
            file.sync_all().await?;
            fs::rename(&temp_path, target).await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                path = %target.display(),
                size_bytes = parts.iter().map(|part| part.len()).sum::<usize>(),
                "Local storage write failed"
            );
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::from_io(
                format!("Failed to write file {}", target.display()),
                e,
            ));
        }
        Ok(())
    }

    /// Read the header of an object file. Files without one (not written by
    /// this backend) and malformed headers degrade to an unknown type with no
    /// metadata.
    async fn read_header(
        &self,
        reader: &mut BufReader<fs::File>,
        target: &Path,
    ) -> io::Result<ObjectHeader> {
        let mut prefix = Vec::with_capacity(OBJECT_MAGIC.len());
        (&mut *reader)
            .take(OBJECT_MAGIC.len() as u64)
            .read_to_end(&mut prefix)
            .await?;
        if prefix != OBJECT_MAGIC {
            tracing::warn!(path = %target.display(), "Object has no metadata header, loading as untyped media");
            return Ok(ObjectHeader {
                encoded: untyped(),
                len: 0,
                leading: prefix,
            });
        }

        let mut line = Vec::new();
        reader.read_until(b'\n', &mut line).await?;
        let len = (prefix.len() + line.len()) as u64;

        let encoded = match line.strip_suffix(&b"\n"[..]) {
            Some(json) => match serde_json::from_slice::<EncodedMedia>(json) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!(
                        path = %target.display(),
                        error = %e,
                        "Malformed metadata header, loading as untyped media"
                    );
                    untyped()
                }
            },
            None => {
                tracing::warn!(path = %target.display(), "Truncated metadata header, loading as untyped media");
                untyped()
            }
        };

        Ok(ObjectHeader {
            encoded,
            len,
            leading: Vec::new(),
        })
    }
}

fn untyped() -> EncodedMedia {
    EncodedMedia {
        content_type: BASE_CONTENT_TYPE.to_string(),
        metadata: Default::default(),
    }
}

/// The path (or one of its parents) does not exist as needed.
fn is_absent(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save(&self, asset: &dyn MediaAsset, path: &str) -> StorageResult<bool> {
        let entity = asset.entity();
        let Some(content) = entity.content() else {
            tracing::warn!(path = %path, name = %entity.name, "Refusing to save media without content");
            return Ok(false);
        };
        asset.validate()?;

        let target = self.resolve_path(path).await?;
        let encoded = self.codec.encode(asset);
        // compact JSON escapes newlines, so the header stays on one line
        let header = serde_json::to_vec(&encoded)
            .map_err(|e| StorageError::Backend(format!("Failed to serialize metadata: {}", e)))?;

        let start = std::time::Instant::now();

        self.ensure_parent_dir(&target).await?;
        if let Ok(existing) = fs::metadata(&target).await {
            if existing.is_dir() {
                return Err(StorageError::InvalidPath(format!("{}: is a directory", path)));
            }
        }

        let parts: [&[u8]; 4] = [OBJECT_MAGIC, &header, b"\n", &content[..]];
        self.write_atomic(&target, &parts).await?;

        tracing::info!(
            path = %target.display(),
            key = %path,
            content_type = %encoded.content_type,
            size_bytes = content.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage save successful"
        );

        Ok(true)
    }

    async fn load(
        &self,
        path: &str,
        with_content: bool,
    ) -> StorageResult<Option<Box<dyn MediaAsset>>> {
        let target = self.resolve_path(path).await?;
        let start = std::time::Instant::now();

        // header, size and content all come from this one open file
        let file = match fs::File::open(&target).await {
            Ok(file) => file,
            Err(e) if is_absent(&e) => return Ok(None),
            Err(e) => {
                return Err(StorageError::from_io(
                    format!("Failed to open {}", target.display()),
                    e,
                ))
            }
        };
        let file_meta = file.metadata().await.map_err(|e| {
            StorageError::from_io(format!("Failed to stat {}", target.display()), e)
        })?;
        if !file_meta.is_file() {
            return Ok(None);
        }

        let mut reader = BufReader::new(file);
        let header = self.read_header(&mut reader, &target).await.map_err(|e| {
            StorageError::from_io(format!("Failed to read file {}", target.display()), e)
        })?;

        let last_modified = file_meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let common = CommonFields::resolve(
            name_from_path(path),
            file_meta.len().saturating_sub(header.len),
            &header.encoded.metadata,
            last_modified,
        );
        let mut asset =
            self.codec
                .decode(&header.encoded.content_type, &header.encoded.metadata, common);

        if with_content {
            let mut content = header.leading;
            reader.read_to_end(&mut content).await.map_err(|e| {
                StorageError::from_io(format!("Failed to read file {}", target.display()), e)
            })?;
            asset.entity_mut().set_content(content);
        }

        tracing::info!(
            path = %target.display(),
            key = %path,
            kind = asset.kind_name(),
            with_content,
            size_bytes = asset.entity().size(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage load successful"
        );

        Ok(Some(asset))
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let target = self.resolve_path(path).await?;
        let start = std::time::Instant::now();

        match fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(false),
            Err(e) if is_absent(&e) => return Ok(false),
            Err(e) => {
                return Err(StorageError::from_io(
                    format!("Failed to stat {}", target.display()),
                    e,
                ))
            }
        }

        match fs::remove_file(&target).await {
            Ok(()) => {}
            Err(e) if is_absent(&e) => return Ok(false),
            Err(e) => {
                return Err(StorageError::from_io(
                    format!("Failed to delete file {}", target.display()),
                    e,
                ))
            }
        }

        tracing::info!(
            path = %target.display(),
            key = %path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let target = self.resolve_path(path).await?;
        match fs::metadata(&target).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(StorageError::from_io(
                format!("Failed to stat {}", target.display()),
                e,
            )),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
