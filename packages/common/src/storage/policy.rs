use super::error::StorageError;

/// Image types accepted for profile pictures.
pub const IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];

/// Default upload ceiling: 5 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Size and content-type limits applied before a payload reaches a backend.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// `None` accepts any content type.
    allowed_types: Option<Vec<String>>,
    max_size: u64,
}

impl UploadPolicy {
    /// Images only (png, jpeg, gif).
    pub fn images(max_size: u64) -> Self {
        Self {
            allowed_types: Some(IMAGE_TYPES.iter().map(|t| t.to_string()).collect()),
            max_size,
        }
    }

    /// Any content type, size-limited.
    pub fn any(max_size: u64) -> Self {
        Self {
            allowed_types: None,
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Reject the payload if it is too large or of a disallowed type.
    pub fn check(&self, content_type: &str, size: u64) -> Result<(), StorageError> {
        if size > self.max_size {
            return Err(StorageError::SizeLimitExceeded {
                actual: size,
                limit: self.max_size,
            });
        }
        if let Some(allowed) = &self.allowed_types {
            let essence = essence(content_type);
            if !allowed.iter().any(|t| *t == essence) {
                return Err(StorageError::UnsupportedType(content_type.to_string()));
            }
        }
        Ok(())
    }

    /// Preferred file extension for an accepted image type.
    pub fn image_extension(content_type: &str) -> Option<&'static str> {
        match essence(content_type).as_str() {
            "image/png" => Some("png"),
            "image/jpeg" => Some("jpg"),
            "image/gif" => Some("gif"),
            _ => None,
        }
    }
}

/// `image/PNG; charset=x` -> `image/png`
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
