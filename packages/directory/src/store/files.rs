use std::sync::Arc;
use std::time::Duration;

use common::storage::{
    BlobEntry, BlobInfo, BlobKey, BlobMetadata, BlobStore, DOCUMENTS, PICTURES,
    StorageError, UploadPolicy, is_valid_document_type, normalize_extension,
};
use tracing::{debug, info, instrument};

use crate::models::{EmployeeId, Upload};

/// Default lifetime of an issued access URL.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Employee-facing view of the blob store: upload policies, key issuance,
/// access URLs and per-owner listings.
#[derive(Clone)]
pub struct EmployeeFiles {
    backend: Arc<dyn BlobStore>,
    pictures: UploadPolicy,
    documents: UploadPolicy,
}

impl EmployeeFiles {
    pub fn new(backend: Arc<dyn BlobStore>, max_picture_size: u64, max_document_size: u64) -> Self {
        Self {
            backend,
            pictures: UploadPolicy::images(max_picture_size),
            documents: UploadPolicy::any(max_document_size),
        }
    }

    /// Store a profile picture under a fresh key.
    ///
    /// Size and type are checked before the backend is contacted.
    #[instrument(skip(self, owner, upload), fields(employee_id = %owner, size = upload.size()))]
    pub async fn upload_picture(
        &self,
        owner: &EmployeeId,
        upload: &Upload,
    ) -> Result<BlobKey, StorageError> {
        let content_type = upload.content_type.as_deref().unwrap_or_default();
        self.pictures.check(content_type, upload.size())?;

        let owner_id = owner.to_string();
        let key = BlobKey::picture(&owner_id, UploadPolicy::image_extension(content_type))?;
        let metadata =
            BlobMetadata::new(owner_id, content_type).with_filename(upload.filename.clone());
        self.backend.put(&key, &upload.bytes, &metadata).await?;

        info!(%key, "Stored profile picture");
        Ok(key)
    }

    /// Store a document of `document_type` under a fresh key. The content type
    /// is guessed from the filename when the upload does not declare one.
    #[instrument(skip(self, owner, upload), fields(employee_id = %owner, size = upload.size()))]
    pub async fn upload_document(
        &self,
        owner: &EmployeeId,
        document_type: &str,
        upload: &Upload,
    ) -> Result<BlobInfo, StorageError> {
        if !is_valid_document_type(document_type) {
            return Err(StorageError::InvalidKey(format!(
                "invalid document type: {document_type}"
            )));
        }
        let content_type = match &upload.content_type {
            Some(ct) => ct.clone(),
            None => upload
                .filename
                .as_deref()
                .map(|name| mime_guess::from_path(name).first_or_octet_stream().to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        };
        self.documents.check(&content_type, upload.size())?;

        let owner_id = owner.to_string();
        let extension = upload.extension().and_then(normalize_extension);
        let key = BlobKey::document(&owner_id, document_type, extension.as_deref())?;
        let metadata = BlobMetadata::new(owner_id, content_type)
            .with_filename(upload.filename.clone())
            .with_document_type(document_type);
        self.backend.put(&key, &upload.bytes, &metadata).await?;

        info!(%key, "Stored document");
        Ok(BlobInfo {
            key,
            size: upload.size(),
            metadata,
        })
    }

    /// Derive a time-limited read URL. Fails with `NotFound` for a missing blob.
    pub async fn issue_access_url(
        &self,
        key: &BlobKey,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        if !self.backend.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.sign_access_url(key, ttl).await
    }

    /// Sign a read URL for a blob known to exist, skipping the existence check.
    pub async fn sign_access_url(
        &self,
        key: &BlobKey,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.backend.presign_get(key, ttl).await
    }

    pub async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError> {
        self.backend.exists(key).await
    }

    /// Deleting a missing blob is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &BlobKey) -> Result<(), StorageError> {
        if self.backend.delete(key).await? {
            debug!("Deleted blob");
        } else {
            debug!("Blob already absent");
        }
        Ok(())
    }

    /// Every document stored for `owner`, with metadata.
    pub async fn documents(&self, owner: &EmployeeId) -> Result<Vec<BlobInfo>, StorageError> {
        let prefix = BlobKey::owner_prefix(DOCUMENTS, &owner.to_string());
        let mut documents = Vec::new();
        for entry in self.backend.list(&prefix).await? {
            match self.backend.head(&entry.key).await {
                Ok(info) => documents.push(info),
                // Deleted between list and head.
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }

    /// Every blob, picture or document, whose key names `owner`.
    pub async fn owned_by(&self, owner: &EmployeeId) -> Result<Vec<BlobEntry>, StorageError> {
        let owner_id = owner.to_string();
        let mut entries = Vec::new();
        for namespace in [PICTURES, DOCUMENTS] {
            entries.extend(
                self.backend
                    .list(&BlobKey::owner_prefix(namespace, &owner_id))
                    .await?,
            );
        }
        Ok(entries)
    }

    /// All blob keys with their owning id embedded, for reconciliation.
    pub async fn inventory(&self) -> Result<Vec<BlobEntry>, StorageError> {
        self.backend.list("").await
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.backend.health_check().await
    }
}
