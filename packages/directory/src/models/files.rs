use chrono::{DateTime, Utc};
use common::storage::{BlobInfo, BlobKey};
use serde::Serialize;

use super::employee::Employee;

/// A binary payload handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    /// Declared MIME type. Guessed from `filename` for documents when absent.
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl Upload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Extension of the original filename, if any.
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
    }
}

/// An employee together with a freshly issued picture URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,
    pub picture_url: Option<String>,
}

/// A stored document and, when one could be signed, a fresh access URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub key: BlobKey,
    pub document_type: String,
    pub content_type: String,
    pub original_filename: Option<String>,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub url: Option<String>,
}

impl DocumentInfo {
    pub fn new(info: BlobInfo, url: Option<String>) -> Self {
        let document_type = info
            .metadata
            .document_type
            .clone()
            .or_else(|| info.key.document_type().map(str::to_owned))
            .unwrap_or_default();
        Self {
            key: info.key,
            document_type,
            content_type: info.metadata.content_type,
            original_filename: info.metadata.original_filename,
            size: info.size,
            uploaded_at: info.metadata.uploaded_at,
            url,
        }
    }
}
