use std::collections::BTreeMap;

use serde::Serialize;

use super::employee::{Employee, EmployeeId};
use common::storage::{BlobEntry, BlobKey};

/// Aggregate counts over every employee, computed fresh from a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_employees: u64,
    pub total_departments: u64,
    pub total_positions: u64,
    pub by_department: BTreeMap<String, u64>,
    pub by_position: BTreeMap<String, u64>,
    pub with_pictures: u64,
    pub blob_usage: BlobUsage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlobUsage {
    pub objects: u64,
    pub bytes: u64,
}

impl Statistics {
    pub fn record(&mut self, employee: &Employee) {
        self.total_employees += 1;
        *self
            .by_department
            .entry(employee.department.clone())
            .or_default() += 1;
        *self.by_position.entry(employee.position.clone()).or_default() += 1;
        if employee.picture_key.is_some() {
            self.with_pictures += 1;
        }
        self.total_departments = self.by_department.len() as u64;
        self.total_positions = self.by_position.len() as u64;
    }

    pub fn with_inventory(mut self, inventory: &[BlobEntry]) -> Self {
        self.blob_usage = BlobUsage {
            objects: inventory.len() as u64,
            bytes: inventory.iter().map(|entry| entry.size).sum(),
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentHealth {
    Healthy,
    Unhealthy,
}

impl ComponentHealth {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Healthy
        } else {
            Self::Unhealthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
    pub overall: ComponentHealth,
}

impl HealthStatus {
    pub fn new(database: ComponentHealth, storage: ComponentHealth) -> Self {
        let overall = if database == ComponentHealth::Healthy && storage == ComponentHealth::Healthy
        {
            ComponentHealth::Healthy
        } else {
            ComponentHealth::Unhealthy
        };
        Self {
            database,
            storage,
            overall,
        }
    }
}

/// Read-only reconciliation report. Nothing is reclaimed by producing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Blobs whose owning employee no longer exists.
    pub unowned_blobs: Vec<BlobKey>,
    /// Pictures of a live employee that its record does not reference.
    pub unreferenced_pictures: Vec<BlobKey>,
    /// Employees whose picture reference points to a missing blob.
    pub dangling_pictures: Vec<EmployeeId>,
}

impl OrphanReport {
    pub fn is_clean(&self) -> bool {
        self.unowned_blobs.is_empty()
            && self.unreferenced_pictures.is_empty()
            && self.dangling_pictures.is_empty()
    }
}
