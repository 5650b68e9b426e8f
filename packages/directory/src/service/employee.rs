use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{BlobKey, DOCUMENTS, StorageError, is_valid_document_type};
use futures::TryStreamExt;
use tracing::{debug, info, instrument, warn};

use crate::error::ServiceError;
use crate::models::employee::email_key;
use crate::models::{
    ComponentHealth, DocumentInfo, Employee, EmployeeDraft, EmployeeFilter, EmployeeId,
    EmployeeView, FieldError, FieldErrorKind, HealthStatus, OrphanReport, Statistics, Upload,
};
use crate::store::files::EmployeeFiles;
use crate::store::record::{RecordError, RecordStore};

/// Composes the record store and the blob store into employee operations.
///
/// Each mutation is a short sequence of store calls. A record never points at
/// a blob that was not yet uploaded or was already deleted; when a sequence
/// fails half-way the only possible leftover is an orphaned blob, which is
/// removed on a best-effort basis and otherwise reported by
/// [`EmployeeService::find_orphans`].
///
/// Email uniqueness is enforced by a full scan before each write. Two
/// concurrent writers with the same email can both pass that check.
pub struct EmployeeService {
    records: Arc<dyn RecordStore>,
    files: EmployeeFiles,
    url_ttl: Duration,
}

impl EmployeeService {
    pub fn new(records: Arc<dyn RecordStore>, files: EmployeeFiles, url_ttl: Duration) -> Self {
        Self {
            records,
            files,
            url_ttl,
        }
    }

    /// Validate, check email uniqueness, upload the picture, then persist.
    #[instrument(skip(self, draft, picture), fields(email = %draft.email))]
    pub async fn create_employee(
        &self,
        draft: EmployeeDraft,
        picture: Option<Upload>,
    ) -> Result<EmployeeView, ServiceError> {
        let profile = draft.into_profile().map_err(ServiceError::Validation)?;
        self.ensure_unique_email(&profile.email, None).await?;

        let id = EmployeeId::new();
        let mut employee = Employee::create(id, profile, Utc::now());
        if let Some(upload) = &picture {
            employee.picture_key = Some(self.files.upload_picture(&id, upload).await?);
        }

        if let Err(err) = self.records.put(&employee).await {
            if let Some(key) = &employee.picture_key {
                self.discard_orphan(key).await;
            }
            return Err(err.into());
        }

        info!(employee_id = %id, "Created employee");
        Ok(self.committed_view(employee).await)
    }

    /// Replace the profile fields and optionally the picture.
    ///
    /// A new picture is uploaded before the record commits and the old one is
    /// deleted only afterwards.
    #[instrument(skip(self, id, draft, picture), fields(employee_id = %id))]
    pub async fn update_employee(
        &self,
        id: EmployeeId,
        draft: EmployeeDraft,
        picture: Option<Upload>,
    ) -> Result<EmployeeView, ServiceError> {
        let mut employee = self.records.get(&id).await?;
        let profile = draft.into_profile().map_err(ServiceError::Validation)?;
        if email_key(&profile.email) != email_key(&employee.email) {
            self.ensure_unique_email(&profile.email, Some(&id)).await?;
        }

        let new_picture = match &picture {
            Some(upload) => Some(self.files.upload_picture(&id, upload).await?),
            None => None,
        };
        employee.apply(profile, Utc::now());
        let replaced = match &new_picture {
            Some(key) => employee.picture_key.replace(key.clone()),
            None => None,
        };
        self.commit_picture_change(&employee, new_picture.as_ref(), replaced.as_ref())
            .await?;

        info!("Updated employee");
        Ok(self.committed_view(employee).await)
    }

    /// Remove the employee, its blobs first. Deleting an absent id succeeds.
    #[instrument(skip(self, id), fields(employee_id = %id))]
    pub async fn delete_employee(&self, id: EmployeeId) -> Result<(), ServiceError> {
        let picture = match self.records.get(&id).await {
            Ok(employee) => employee.picture_key,
            Err(RecordError::NotFound(_)) => {
                debug!("Employee already absent");
                return Ok(());
            }
            // Still deletable; its blobs are found by key prefix below.
            Err(RecordError::Format(e)) => {
                warn!(error = %e, "Deleting unreadable record");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(key) = &picture {
            self.files.delete(key).await?;
        }
        for entry in self.files.owned_by(&id).await? {
            self.files.delete(&entry.key).await?;
        }
        self.records.delete(&id).await?;

        info!("Deleted employee");
        Ok(())
    }

    pub async fn get_employee(&self, id: EmployeeId) -> Result<EmployeeView, ServiceError> {
        let employee = self.records.get(&id).await?;
        self.view(employee).await
    }

    /// Full scan filtered in memory, in scan order.
    #[instrument(skip(self))]
    pub async fn list_employees(
        &self,
        filter: &EmployeeFilter,
    ) -> Result<Vec<EmployeeView>, ServiceError> {
        let matching: Vec<Employee> = self
            .records
            .scan()
            .try_filter(|employee| futures::future::ready(filter.matches(employee)))
            .try_collect()
            .await?;

        let mut views = Vec::with_capacity(matching.len());
        for employee in matching {
            views.push(self.view(employee).await?);
        }
        debug!(count = views.len(), "Listed employees");
        Ok(views)
    }

    #[instrument(skip(self))]
    pub async fn get_statistics(&self) -> Result<Statistics, ServiceError> {
        let mut stats = Statistics::default();
        let mut scan = self.records.scan();
        while let Some(employee) = scan.try_next().await? {
            stats.record(&employee);
        }
        let inventory = self.files.inventory().await?;
        Ok(stats.with_inventory(&inventory))
    }

    /// Distinct department names, sorted.
    pub async fn list_departments(&self) -> Result<Vec<String>, ServiceError> {
        self.distinct(|employee| employee.department.clone()).await
    }

    /// Distinct position titles, sorted.
    pub async fn list_positions(&self) -> Result<Vec<String>, ServiceError> {
        self.distinct(|employee| employee.position.clone()).await
    }

    /// Replace only the picture.
    #[instrument(skip(self, id, upload), fields(employee_id = %id))]
    pub async fn set_picture(
        &self,
        id: EmployeeId,
        upload: Upload,
    ) -> Result<EmployeeView, ServiceError> {
        let mut employee = self.records.get(&id).await?;
        let new_picture = self.files.upload_picture(&id, &upload).await?;
        let previous_picture = employee.picture_key.replace(new_picture.clone());
        employee.touch(Utc::now());

        self.commit_picture_change(&employee, Some(&new_picture), previous_picture.as_ref())
            .await?;

        info!(key = %new_picture, "Replaced picture");
        Ok(self.committed_view(employee).await)
    }

    /// Drop the picture reference, then delete the blob.
    #[instrument(skip(self, id), fields(employee_id = %id))]
    pub async fn remove_picture(&self, id: EmployeeId) -> Result<EmployeeView, ServiceError> {
        let mut employee = self.records.get(&id).await?;
        let Some(previous) = employee.picture_key.take() else {
            return self.view(employee).await;
        };
        employee.touch(Utc::now());

        self.commit_picture_change(&employee, None, Some(&previous))
            .await?;

        info!(key = %previous, "Removed picture");
        Ok(self.committed_view(employee).await)
    }

    #[instrument(skip(self, id, upload), fields(employee_id = %id))]
    pub async fn upload_document(
        &self,
        id: EmployeeId,
        document_type: &str,
        upload: Upload,
    ) -> Result<DocumentInfo, ServiceError> {
        self.records.get(&id).await?;
        if !is_valid_document_type(document_type) {
            return Err(ServiceError::Validation(vec![FieldError::new(
                "document_type",
                FieldErrorKind::Invalid,
            )]));
        }

        let info = self.files.upload_document(&id, document_type, &upload).await?;
        let url = self.committed_url(&info.key).await;
        Ok(DocumentInfo::new(info, url))
    }

    pub async fn list_documents(&self, id: EmployeeId) -> Result<Vec<DocumentInfo>, ServiceError> {
        self.records.get(&id).await?;

        let mut documents = Vec::new();
        for info in self.files.documents(&id).await? {
            match self.files.issue_access_url(&info.key, self.url_ttl).await {
                Ok(url) => documents.push(DocumentInfo::new(info, Some(url))),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(documents)
    }

    /// Delete one of the employee's documents. A key that does not name a
    /// document of this employee is `NotFound`.
    #[instrument(skip(self, id), fields(employee_id = %id))]
    pub async fn delete_document(&self, id: EmployeeId, key: &str) -> Result<(), ServiceError> {
        self.records.get(&id).await?;

        let owner = id.to_string();
        let key = BlobKey::parse(key)
            .ok()
            .filter(|key| key.namespace() == DOCUMENTS && key.owner() == owner)
            .ok_or_else(|| ServiceError::NotFound(format!("document {key}")))?;
        self.files.delete(&key).await?;

        info!(%key, "Deleted document");
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        let database = self.records.ping().await;
        if let Err(e) = &database {
            warn!(error = %e, "Record store health check failed");
        }
        let storage = self.files.health_check().await;
        if let Err(e) = &storage {
            warn!(error = %e, "Blob store health check failed");
        }
        HealthStatus::new(
            ComponentHealth::from_result(&database),
            ComponentHealth::from_result(&storage),
        )
    }

    /// Diff the blob inventory against live records. Reports only; nothing is
    /// deleted.
    #[instrument(skip(self))]
    pub async fn find_orphans(&self) -> Result<OrphanReport, ServiceError> {
        let pictures: HashMap<String, Option<BlobKey>> = self
            .records
            .scan()
            .map_ok(|employee| (employee.employee_id.to_string(), employee.picture_key))
            .try_collect()
            .await?;
        let inventory = self.files.inventory().await?;
        let stored: HashSet<&BlobKey> = inventory.iter().map(|entry| &entry.key).collect();

        let mut report = OrphanReport::default();
        for entry in &inventory {
            match pictures.get(entry.key.owner()) {
                None => report.unowned_blobs.push(entry.key.clone()),
                Some(current) if entry.key.is_picture() && current.as_ref() != Some(&entry.key) => {
                    report.unreferenced_pictures.push(entry.key.clone())
                }
                Some(_) => {}
            }
        }
        for (owner, picture) in &pictures {
            if let Some(key) = picture
                && !stored.contains(key)
                && let Ok(id) = owner.parse::<EmployeeId>()
            {
                report.dangling_pictures.push(id);
            }
        }
        report.dangling_pictures.sort();

        if !report.is_clean() {
            warn!(
                unowned = report.unowned_blobs.len(),
                unreferenced = report.unreferenced_pictures.len(),
                dangling = report.dangling_pictures.len(),
                "Blob store and records disagree"
            );
        }
        Ok(report)
    }

    /// Persist `employee`, then settle the blobs around the write: on failure
    /// the freshly uploaded picture is discarded, on success the replaced one.
    async fn commit_picture_change(
        &self,
        employee: &Employee,
        uploaded: Option<&BlobKey>,
        replaced: Option<&BlobKey>,
    ) -> Result<(), ServiceError> {
        if let Err(err) = self.records.put(employee).await {
            if let Some(key) = uploaded {
                self.discard_orphan(key).await;
            }
            return Err(err.into());
        }
        if let Some(old) = replaced
            && uploaded != Some(old)
        {
            self.discard_orphan(old).await;
        }
        Ok(())
    }

    async fn ensure_unique_email(
        &self,
        email: &str,
        exclude: Option<&EmployeeId>,
    ) -> Result<(), ServiceError> {
        let wanted = email_key(email);
        let mut scan = self.records.scan();
        while let Some(existing) = scan.try_next().await? {
            if Some(&existing.employee_id) != exclude && email_key(&existing.email) == wanted {
                return Err(ServiceError::DuplicateEmail(email.to_string()));
            }
        }
        Ok(())
    }

    /// Best-effort compensating delete. Failure leaves the blob for reconciliation.
    async fn discard_orphan(&self, key: &BlobKey) {
        if let Err(e) = self.files.delete(key).await {
            warn!(%key, error = %e, "Could not delete orphaned blob");
        }
    }

    async fn distinct(
        &self,
        field: impl Fn(&Employee) -> String,
    ) -> Result<Vec<String>, ServiceError> {
        let mut values = BTreeSet::new();
        let mut scan = self.records.scan();
        while let Some(employee) = scan.try_next().await? {
            values.insert(field(&employee));
        }
        Ok(values.into_iter().collect())
    }

    /// View of an employee whose write has already been persisted. The URL is
    /// signed without an existence check; a signing failure yields no URL.
    async fn committed_view(&self, employee: Employee) -> EmployeeView {
        let picture_url = match &employee.picture_key {
            Some(key) => self.committed_url(key).await,
            None => None,
        };
        EmployeeView {
            employee,
            picture_url,
        }
    }

    async fn committed_url(&self, key: &BlobKey) -> Option<String> {
        match self.files.sign_access_url(key, self.url_ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(%key, error = %e, "Could not issue access URL after commit");
                None
            }
        }
    }

    /// Attach a fresh access URL. A reference to a missing blob yields no URL.
    async fn view(&self, employee: Employee) -> Result<EmployeeView, ServiceError> {
        let picture_url = match &employee.picture_key {
            Some(key) => match self.files.issue_access_url(key, self.url_ttl).await {
                Ok(url) => Some(url),
                Err(StorageError::NotFound(_)) => {
                    warn!(employee_id = %employee.employee_id, %key, "Picture reference is dangling");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        Ok(EmployeeView {
            employee,
            picture_url,
        })
    }
}
