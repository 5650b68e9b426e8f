use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use super::error::StorageError;
use super::key::{BlobKey, NAMESPACES};
use super::metadata::{BlobEntry, BlobInfo, BlobMetadata};
use super::signer::UrlSigner;
use super::traits::BlobStore;

const TMP_DIR: &str = ".tmp";
const META_DIR: &str = ".meta";

/// Filesystem-backed blob store.
///
/// Blobs live at `{base_path}/{namespace}/{file_name}` with their metadata as
/// JSON under `{base_path}/.meta/{namespace}/{file_name}.json`. Access URLs
/// are signed by a [`UrlSigner`] and served by whatever fronts `base_path`.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    signer: UrlSigner,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating its directories.
    pub async fn new(base_path: PathBuf, signer: UrlSigner) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(TMP_DIR)).await?;
        for ns in NAMESPACES {
            fs::create_dir_all(base_path.join(ns)).await?;
            fs::create_dir_all(base_path.join(META_DIR).join(ns)).await?;
        }
        Ok(Self { base_path, signer })
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    fn blob_path(&self, key: &BlobKey) -> PathBuf {
        self.base_path.join(key.namespace()).join(key.file_name())
    }

    fn meta_path(&self, key: &BlobKey) -> PathBuf {
        self.base_path
            .join(META_DIR)
            .join(key.namespace())
            .join(format!("{}.json", key.file_name()))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(TMP_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Write via a temp file and rename so readers never see a partial blob.
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        metadata: &BlobMetadata,
    ) -> Result<(), StorageError> {
        let meta_path = self.meta_path(key);
        self.write_atomic(&meta_path, &serde_json::to_vec(metadata)?)
            .await?;

        if let Err(e) = self.write_atomic(&self.blob_path(key), data).await {
            let _ = fs::remove_file(&meta_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &BlobKey) -> Result<BlobInfo, StorageError> {
        let size = match fs::metadata(self.blob_path(key)).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let raw = match fs::read(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::Metadata(format!("no metadata for {key}")));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(BlobInfo {
            key: key.clone(),
            size,
            metadata: serde_json::from_slice(&raw)?,
        })
    }

    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError> {
        let deleted = match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(self.meta_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(deleted)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError> {
        let mut entries = Vec::new();
        for ns in NAMESPACES {
            let dir = self.base_path.join(ns);
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = read_dir.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                let raw_key = format!("{ns}/{name}");
                if !raw_key.starts_with(prefix) {
                    continue;
                }
                let key = match BlobKey::parse(raw_key) {
                    Ok(key) => key,
                    Err(e) => {
                        debug!(dir = %dir.display(), %name, "Skipping foreign file: {e}");
                        continue;
                    }
                };
                let meta = entry.metadata().await?;
                entries.push(BlobEntry {
                    key,
                    size: meta.len(),
                    last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn presign_get(&self, key: &BlobKey, ttl: Duration) -> Result<String, StorageError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::InvalidKey(format!("ttl out of range: {e}")))?;
        Ok(self.signer.sign(key, Utc::now() + ttl))
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        if fs::try_exists(&self.base_path).await? {
            Ok(())
        } else {
            Err(StorageError::Unavailable(format!(
                "{} does not exist",
                self.base_path.display()
            )))
        }
    }
}
