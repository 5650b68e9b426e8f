use std::time::Duration;

use common::config::StorageAppConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Rows fetched per scan page.
    pub table_page_size: u64,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `directory=debug`.
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("DIRECTORY_CONFIG").unwrap_or_else(|_| "config/config".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("database.url", "sqlite://directory.db?mode=rwc")?
            .set_default("database.table_page_size", 100)?
            .set_default("database.max_connections", 10)?
            .set_default("log.level", "info")?
            .add_source(File::with_name(path).required(false))
            // Override from environment (e.g., DIRECTORY__STORAGE__S3__BUCKET)
            .add_source(Environment::with_prefix("DIRECTORY").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.url_ttl_secs)
    }
}
