pub mod files;
pub mod record;
pub mod sea;

pub use files::{DEFAULT_URL_TTL, EmployeeFiles};
pub use record::{RecordError, RecordStore};
pub use sea::SeaRecordStore;
