pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod models;
pub mod service;
pub mod store;

pub use error::ServiceError;
pub use service::EmployeeService;
