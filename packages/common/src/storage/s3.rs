use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::debug;

use super::error::StorageError;
use super::key::BlobKey;
use super::metadata::{BlobEntry, BlobInfo, BlobMetadata};
use super::traits::BlobStore;
use crate::config::S3StorageConfig;

const META_OWNER: &str = "owner-id";
const META_UPLOADED_AT: &str = "uploaded-at";
const META_FILENAME: &str = "original-filename";
const META_DOCUMENT_TYPE: &str = "document-type";

/// S3-compatible blob store (AWS S3, MinIO, LocalStack, ...).
///
/// Metadata travels as `x-amz-meta-*` headers; access URLs are SigV4
/// presigned GETs whose expiry is enforced by the object store.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
}

impl S3BlobStore {
    pub fn new(config: &S3StorageConfig) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Unavailable(format!("bad region: {e}")))?,
        };

        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => {
                Credentials::new(Some(access.as_str()), Some(secret.as_str()), None, None, None)
            }
            _ => Credentials::default(),
        }
        .map_err(|e| StorageError::AccessDenied(format!("credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials).map_err(map_s3_error)?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &BlobKey,
        data: &[u8],
        metadata: &BlobMetadata,
    ) -> Result<(), StorageError> {
        let mut bucket = self.bucket.clone();
        for (name, value) in metadata_headers(metadata) {
            bucket.add_header(&format!("x-amz-meta-{name}"), &value);
        }

        let response = bucket
            .put_object_with_content_type(key.as_str(), data, &metadata.content_type)
            .await
            .map_err(map_s3_error)?;
        check_status(response.status_code(), key.as_str())
    }

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StorageError> {
        let response = self
            .bucket
            .get_object(key.as_str())
            .await
            .map_err(map_s3_error)?;
        check_status(response.status_code(), key.as_str())?;
        Ok(response.bytes().to_vec())
    }

    async fn head(&self, key: &BlobKey) -> Result<BlobInfo, StorageError> {
        let (head, status) = self
            .bucket
            .head_object(key.as_str())
            .await
            .map_err(map_s3_error)?;
        check_status(status, key.as_str())?;

        let headers = head.metadata.unwrap_or_default();
        let content_type = head
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Ok(BlobInfo {
            key: key.clone(),
            size: head.content_length.unwrap_or_default().max(0) as u64,
            metadata: metadata_from_headers(key, content_type, &headers),
        })
    }

    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError> {
        let response = self
            .bucket
            .delete_object(key.as_str())
            .await
            .map_err(map_s3_error)?;
        match check_status(response.status_code(), key.as_str()) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .await
            .map_err(map_s3_error)?;

        let mut entries = Vec::new();
        for object in pages.into_iter().flat_map(|page| page.contents) {
            let key = match BlobKey::parse(object.key.clone()) {
                Ok(key) => key,
                Err(e) => {
                    debug!(key = %object.key, "Skipping foreign object: {e}");
                    continue;
                }
            };
            entries.push(BlobEntry {
                key,
                size: object.size,
                last_modified: DateTime::parse_from_rfc3339(&object.last_modified)
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
            });
        }
        Ok(entries)
    }

    async fn presign_get(&self, key: &BlobKey, ttl: Duration) -> Result<String, StorageError> {
        let expiry_secs = u32::try_from(ttl.as_secs())
            .map_err(|_| StorageError::InvalidKey("ttl out of range".into()))?;
        self.bucket
            .presign_get(key.as_str(), expiry_secs, None)
            .await
            .map_err(map_s3_error)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let (_, status) = self
            .bucket
            .list_page(String::new(), None, None, None, Some(1))
            .await
            .map_err(map_s3_error)?;
        check_status(status, self.bucket.name().as_str())
    }
}

fn map_s3_error(err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(status, body) => status_error(status, &body),
        S3Error::Credentials(e) => StorageError::AccessDenied(e.to_string()),
        other => StorageError::Unavailable(other.to_string()),
    }
}

fn check_status(status: u16, subject: &str) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(status_error(status, subject))
    }
}

fn status_error(status: u16, subject: &str) -> StorageError {
    match status {
        404 => StorageError::NotFound(subject.to_string()),
        401 | 403 => StorageError::AccessDenied(format!("{subject} (HTTP {status})")),
        _ => StorageError::Unavailable(format!("{subject} (HTTP {status})")),
    }
}

fn metadata_headers(metadata: &BlobMetadata) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        (META_OWNER, header_safe(&metadata.owner_id)),
        (META_UPLOADED_AT, metadata.uploaded_at.to_rfc3339()),
    ];
    if let Some(filename) = &metadata.original_filename {
        headers.push((META_FILENAME, header_safe(filename)));
    }
    if let Some(document_type) = &metadata.document_type {
        headers.push((META_DOCUMENT_TYPE, header_safe(document_type)));
    }
    headers
}

fn metadata_from_headers(
    key: &BlobKey,
    content_type: String,
    headers: &HashMap<String, String>,
) -> BlobMetadata {
    BlobMetadata {
        owner_id: headers
            .get(META_OWNER)
            .cloned()
            .unwrap_or_else(|| key.owner().to_string()),
        uploaded_at: headers
            .get(META_UPLOADED_AT)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        content_type,
        original_filename: headers.get(META_FILENAME).cloned(),
        document_type: headers
            .get(META_DOCUMENT_TYPE)
            .cloned()
            .or_else(|| key.document_type().map(str::to_owned)),
    }
}

/// Header values must be visible ASCII.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}
