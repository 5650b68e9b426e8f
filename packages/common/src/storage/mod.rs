mod error;
mod key;
mod metadata;
mod policy;
mod signer;
mod traits;

pub mod filesystem;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use key::{
    BlobKey, DOCUMENTS, NAMESPACES, PICTURES, is_valid_document_type, normalize_extension,
};
pub use metadata::{BlobEntry, BlobInfo, BlobMetadata};
pub use policy::{DEFAULT_MAX_SIZE, IMAGE_TYPES, UploadPolicy};
pub use signer::UrlSigner;
pub use traits::BlobStore;
