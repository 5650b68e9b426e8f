use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::storage::filesystem::FilesystemBlobStore;
use crate::storage::{BlobStore, DEFAULT_MAX_SIZE, StorageError, UrlSigner};

/// Which blob backend to use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Filesystem,
    S3,
}

/// Local filesystem backend settings.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemStorageConfig {
    /// Root directory for blobs. Default: "./data/blobs".
    #[serde(default = "default_fs_path")]
    pub path: PathBuf,
    /// Base URL under which the root directory is served. Default: "http://127.0.0.1:3000/blobs".
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Secret for access URL signatures. A random per-process secret is used when unset.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

fn default_fs_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_public_url() -> String {
    "http://127.0.0.1:3000/blobs".into()
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            path: default_fs_path(),
            public_url: default_public_url(),
            signing_secret: None,
        }
    }
}

/// S3-compatible backend settings.
#[derive(Debug, Deserialize, Clone)]
pub struct S3StorageConfig {
    /// Bucket name. Default: "employee-directory-files".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Region. Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack). AWS is used when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Static credentials. The default AWS credential chain is used when unset.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Force path-style addressing (required by MinIO).
    #[serde(default)]
    pub path_style: bool,
}

fn default_bucket() -> String {
    "employee-directory-files".into()
}
fn default_region() -> String {
    "us-east-1".into()
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

/// App-level blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Max profile picture size in bytes. Default: 5 MiB.
    #[serde(default = "default_max_size")]
    pub max_picture_size: u64,
    /// Max document size in bytes. Default: 5 MiB.
    #[serde(default = "default_max_size")]
    pub max_document_size: u64,
    /// Lifetime of issued access URLs. Default: 3600.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
    #[serde(default)]
    pub filesystem: FilesystemStorageConfig,
    #[serde(default)]
    pub s3: S3StorageConfig,
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}
fn default_url_ttl_secs() -> u64 {
    3600
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            max_picture_size: default_max_size(),
            max_document_size: default_max_size(),
            url_ttl_secs: default_url_ttl_secs(),
            filesystem: FilesystemStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

impl StorageAppConfig {
    /// Build the configured blob backend.
    pub async fn build(&self) -> Result<Arc<dyn BlobStore>, StorageError> {
        match self.backend {
            StorageBackendKind::Filesystem => {
                let fs = &self.filesystem;
                let signer = match &fs.signing_secret {
                    Some(secret) => UrlSigner::new(&fs.public_url, secret.as_bytes().to_vec()),
                    None => {
                        tracing::warn!("No signing secret configured; access URLs expire on restart");
                        UrlSigner::ephemeral(&fs.public_url)
                    }
                };
                Ok(Arc::new(
                    FilesystemBlobStore::new(fs.path.clone(), signer).await?,
                ))
            }
            #[cfg(feature = "object-storage")]
            StorageBackendKind::S3 => Ok(Arc::new(crate::storage::s3::S3BlobStore::new(
                &self.s3,
            )?)),
            #[cfg(not(feature = "object-storage"))]
            StorageBackendKind::S3 => Err(StorageError::Unavailable(
                "built without the object-storage feature".into(),
            )),
        }
    }
}
