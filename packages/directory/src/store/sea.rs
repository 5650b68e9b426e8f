use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, Statement,
};
use serde_json::Value;
use tracing::{debug, instrument};

use super::record::{RecordError, RecordStore};
use crate::entity::employee_record;
use crate::models::{Employee, EmployeeId, FormatError};

/// Record store over a single SeaORM table of JSON documents.
pub struct SeaRecordStore {
    db: DatabaseConnection,
    page_size: u64,
}

impl SeaRecordStore {
    pub fn new(db: DatabaseConnection, page_size: u64) -> Self {
        Self {
            db,
            page_size: page_size.max(1),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// One page of rows ordered by id, strictly after `after` when given.
    async fn page(
        &self,
        after: Option<String>,
    ) -> Result<Vec<employee_record::Model>, RecordError> {
        let mut query = employee_record::Entity::find()
            .order_by_asc(employee_record::Column::Id)
            .limit(self.page_size);
        if let Some(after) = after {
            query = query.filter(employee_record::Column::Id.gt(after));
        }
        Ok(query.all(&self.db).await?)
    }
}

fn decode(row: employee_record::Model) -> Result<Employee, RecordError> {
    let Value::Object(document) = row.document else {
        return Err(FormatError(format!("record {} is not a JSON object", row.id)).into());
    };
    let employee = Employee::from_record(&document)?;
    if employee.employee_id.to_string() != row.id {
        return Err(FormatError(format!(
            "record {} carries employee_id {}",
            row.id, employee.employee_id
        ))
        .into());
    }
    Ok(employee)
}

#[async_trait]
impl RecordStore for SeaRecordStore {
    #[instrument(skip(self, employee), fields(employee_id = %employee.employee_id))]
    async fn put(&self, employee: &Employee) -> Result<(), RecordError> {
        let row = employee_record::ActiveModel {
            id: Set(employee.employee_id.to_string()),
            document: Set(Value::Object(employee.to_record())),
            updated_at: Set(employee.updated_at),
        };
        employee_record::Entity::insert(row)
            .on_conflict(
                OnConflict::column(employee_record::Column::Id)
                    .update_columns([
                        employee_record::Column::Document,
                        employee_record::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn get(&self, id: &EmployeeId) -> Result<Employee, RecordError> {
        let row = employee_record::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or(RecordError::NotFound(*id))?;
        decode(row)
    }

    #[instrument(skip(self), fields(employee_id = %id))]
    async fn delete(&self, id: &EmployeeId) -> Result<(), RecordError> {
        let result = employee_record::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            debug!("No record to delete");
        }
        Ok(())
    }

    fn scan(&self) -> BoxStream<'_, Result<Employee, RecordError>> {
        // State: `None` once exhausted, otherwise the id the next page starts after.
        let start: Option<Option<String>> = Some(None);
        stream::try_unfold(start, move |cursor| async move {
            let Some(after) = cursor else {
                return Ok::<_, RecordError>(None);
            };
            let rows = self.page(after).await?;
            if rows.is_empty() {
                return Ok(None);
            }
            let next = if rows.len() as u64 == self.page_size {
                rows.last().map(|row| Some(row.id.clone()))
            } else {
                None
            };
            Ok(Some((rows, next)))
        })
        .map_ok(|rows| stream::iter(rows.into_iter().map(decode)))
        .try_flatten()
        .boxed()
    }

    async fn ping(&self) -> Result<(), RecordError> {
        let backend = self.db.get_database_backend();
        self.db
            .execute_raw(Statement::from_string(backend, "SELECT 1"))
            .await?;
        Ok(())
    }
}
