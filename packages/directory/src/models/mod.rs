pub mod employee;
pub mod files;
pub mod filter;
pub mod stats;

pub use employee::{
    Employee, EmployeeDraft, EmployeeId, FieldError, FieldErrorKind, FormatError, Profile,
};
pub use files::{DocumentInfo, EmployeeView, Upload};
pub use filter::EmployeeFilter;
pub use stats::{BlobUsage, ComponentHealth, HealthStatus, OrphanReport, Statistics};
