use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;

/// Namespace holding profile pictures.
pub const PICTURES: &str = "profile-pictures";
/// Namespace holding employee documents.
pub const DOCUMENTS: &str = "documents";
/// Every namespace a key may live in.
pub const NAMESPACES: [&str; 2] = [PICTURES, DOCUMENTS];

const MAX_KEY_LEN: usize = 512;
const MAX_EXTENSION_LEN: usize = 8;
const MAX_DOCUMENT_TYPE_LEN: usize = 32;

/// A validated blob key of the form `{namespace}/{owner}_{suffix}`.
///
/// The owning entity id is embedded in the key so that an inventory of keys is
/// enough to attribute every blob to its owner.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobKey(String);

impl BlobKey {
    /// Issue a fresh key for a profile picture.
    ///
    /// Every call yields a new key, so a replacement picture never overwrites
    /// the one still referenced by the current record.
    pub fn picture(owner: &str, extension: Option<&str>) -> Result<Self, StorageError> {
        validate_owner(owner)?;
        Self::parse(format!(
            "{PICTURES}/{owner}_{}{}",
            Uuid::new_v4().simple(),
            extension_suffix(extension)
        ))
    }

    /// Issue a fresh key for a document of the given type.
    pub fn document(
        owner: &str,
        document_type: &str,
        extension: Option<&str>,
    ) -> Result<Self, StorageError> {
        validate_owner(owner)?;
        if !is_valid_document_type(document_type) {
            return Err(StorageError::InvalidKey(format!(
                "invalid document type: {document_type}"
            )));
        }
        Self::parse(format!(
            "{DOCUMENTS}/{owner}_{document_type}_{}{}",
            Uuid::new_v4().simple(),
            extension_suffix(extension)
        ))
    }

    /// Parse and validate a key string.
    pub fn parse(s: impl Into<String>) -> Result<Self, StorageError> {
        let s = s.into();
        if s.is_empty() || s.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(format!(
                "key must be 1-{MAX_KEY_LEN} bytes"
            )));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
        {
            return Err(StorageError::InvalidKey(format!(
                "illegal character {c:?} in {s}"
            )));
        }

        let (namespace, file_name) = s
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidKey(format!("missing namespace in {s}")))?;
        if !NAMESPACES.contains(&namespace) {
            return Err(StorageError::InvalidKey(format!(
                "unknown namespace: {namespace}"
            )));
        }
        if file_name.is_empty() || file_name.contains('/') {
            return Err(StorageError::InvalidKey(format!("bad file name in {s}")));
        }
        if file_name.starts_with('.') || file_name.contains("..") {
            return Err(StorageError::InvalidKey(format!("path traversal in {s}")));
        }
        match file_name.split_once('_') {
            Some((owner, rest)) if !owner.is_empty() && !rest.is_empty() => {}
            _ => {
                return Err(StorageError::InvalidKey(format!("missing owner in {s}")));
            }
        }

        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace segment, e.g. `profile-pictures`.
    pub fn namespace(&self) -> &str {
        self.0.split_once('/').map(|(ns, _)| ns).unwrap_or_default()
    }

    /// Everything after the namespace separator.
    pub fn file_name(&self) -> &str {
        self.0.split_once('/').map(|(_, f)| f).unwrap_or_default()
    }

    /// Id of the entity this blob was uploaded for.
    pub fn owner(&self) -> &str {
        self.file_name()
            .split_once('_')
            .map(|(owner, _)| owner)
            .unwrap_or_default()
    }

    /// Document type segment, for keys in the documents namespace.
    pub fn document_type(&self) -> Option<&str> {
        if self.namespace() != DOCUMENTS {
            return None;
        }
        let (_, rest) = self.file_name().split_once('_')?;
        rest.split_once('_').map(|(doc_type, _)| doc_type)
    }

    pub fn is_picture(&self) -> bool {
        self.namespace() == PICTURES
    }

    /// Listing prefix covering every key `owner` holds in `namespace`.
    pub fn owner_prefix(namespace: &str, owner: &str) -> String {
        format!("{namespace}/{owner}_")
    }
}

/// Returns `true` for a lowercase slug usable as a document type.
pub fn is_valid_document_type(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_DOCUMENT_TYPE_LEN
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Normalise a file extension for use in a key. Returns `None` when the
/// extension is empty, too long, or not alphanumeric.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}

fn extension_suffix(extension: Option<&str>) -> String {
    extension
        .and_then(normalize_extension)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

fn validate_owner(owner: &str) -> Result<(), StorageError> {
    if owner.is_empty() || !owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(StorageError::InvalidKey(format!("invalid owner id: {owner}")));
    }
    Ok(())
}

impl FromStr for BlobKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobKey({})", self.0)
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BlobKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BlobKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(s).map_err(serde::de::Error::custom)
    }
}
