use std::fmt;

/// Errors that can occur during blob storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// The requested blob was not found.
    NotFound(String),
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The provided blob key is malformed.
    InvalidKey(String),
    /// The payload exceeds the configured size limit.
    SizeLimitExceeded { actual: u64, limit: u64 },
    /// The payload's content type is not on the allow-list.
    UnsupportedType(String),
    /// The backend refused the request for lack of permission.
    AccessDenied(String),
    /// The backend could not be reached or timed out.
    Unavailable(String),
    /// Stored blob metadata could not be read or written.
    Metadata(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "blob not found: {key}"),
            Self::Io(err) => write!(f, "storage IO error: {err}"),
            Self::InvalidKey(msg) => write!(f, "invalid blob key: {msg}"),
            Self::SizeLimitExceeded { actual, limit } => {
                write!(f, "blob exceeds size limit ({actual} > {limit} bytes)")
            }
            Self::UnsupportedType(content_type) => {
                write!(f, "unsupported content type: {content_type}")
            }
            Self::AccessDenied(msg) => write!(f, "storage access denied: {msg}"),
            Self::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            Self::Metadata(msg) => write!(f, "blob metadata error: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Metadata(err.to_string())
    }
}
