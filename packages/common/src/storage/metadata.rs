use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::BlobKey;

/// Descriptive metadata stored alongside each blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Id of the entity the blob was uploaded for.
    pub owner_id: String,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
}

impl BlobMetadata {
    pub fn new(owner_id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            uploaded_at: Utc::now(),
            content_type: content_type.into(),
            original_filename: None,
            document_type: None,
        }
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.original_filename = filename;
        self
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }
}

/// A listing entry: enough to attribute and size a blob without fetching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub key: BlobKey,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Full description of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: BlobKey,
    pub size: u64,
    pub metadata: BlobMetadata,
}
