use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;
use sea_orm::DbErr;
use thiserror::Error;

use crate::models::{Employee, EmployeeId, FormatError};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("employee record not found: {0}")]
    NotFound(EmployeeId),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store at capacity: {0}")]
    Capacity(String),
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl From<DbErr> for RecordError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(e) => RecordError::Capacity(e.to_string()),
            other => RecordError::Unavailable(other.to_string()),
        }
    }
}

/// Durable per-key storage of employee records.
///
/// Writes are atomic per record. There is no secondary index, so lookups by
/// anything other than the id go through [`RecordStore::scan`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Unconditional upsert keyed by `employee_id`.
    async fn put(&self, employee: &Employee) -> Result<(), RecordError>;

    async fn get(&self, id: &EmployeeId) -> Result<Employee, RecordError>;

    /// Deleting an id that does not exist is not an error.
    async fn delete(&self, id: &EmployeeId) -> Result<(), RecordError>;

    /// Every stored employee. Each call re-reads the store from the start and
    /// follows pagination until the set is exhausted.
    fn scan(&self) -> BoxStream<'_, Result<Employee, RecordError>>;

    /// All live employee ids.
    async fn list_ids(&self) -> Result<Vec<EmployeeId>, RecordError> {
        self.scan()
            .map_ok(|employee| employee.employee_id)
            .try_collect()
            .await
    }

    async fn ping(&self) -> Result<(), RecordError>;
}
