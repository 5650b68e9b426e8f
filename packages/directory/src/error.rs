use common::storage::StorageError;
use thiserror::Error;

use crate::models::{FieldError, FormatError};
use crate::store::record::RecordError;

/// Errors surfaced by [`crate::service::EmployeeService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Every field violation found, not just the first.
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<FieldError>),
    #[error("email already in use: {0}")]
    DuplicateEmail(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store at capacity: {0}")]
    StoreCapacity(String),
    #[error("payload of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { actual: u64, limit: u64 },
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl ServiceError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ServiceError::StoreCapacity(_) => "STORE_CAPACITY",
            ServiceError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            ServiceError::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            ServiceError::AccessDenied(_) => "ACCESS_DENIED",
            ServiceError::Format(_) => "FORMAT_ERROR",
        }
    }

    /// Infrastructure failures a caller may retry. Validation and business
    /// rule violations are deterministic and never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::StoreUnavailable(_) | ServiceError::StoreCapacity(_)
        )
    }
}

fn join(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<RecordError> for ServiceError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(id) => ServiceError::NotFound(format!("employee {id}")),
            RecordError::Unavailable(msg) => ServiceError::StoreUnavailable(msg),
            RecordError::Capacity(msg) => ServiceError::StoreCapacity(msg),
            RecordError::Format(e) => ServiceError::Format(e),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => ServiceError::NotFound(format!("blob {key}")),
            // A key that does not parse cannot name a stored blob.
            StorageError::InvalidKey(msg) => ServiceError::NotFound(msg),
            StorageError::SizeLimitExceeded { actual, limit } => {
                ServiceError::PayloadTooLarge { actual, limit }
            }
            StorageError::UnsupportedType(ct) => ServiceError::UnsupportedType(ct),
            StorageError::AccessDenied(msg) => ServiceError::AccessDenied(msg),
            StorageError::Unavailable(msg) => ServiceError::StoreUnavailable(msg),
            StorageError::Io(e) => ServiceError::StoreUnavailable(e.to_string()),
            StorageError::Metadata(msg) => ServiceError::Format(FormatError(msg)),
        }
    }
}
