//! Certificate store configuration.
//!
//! The store locator is a small JSON file in the classic certdb layout:
//!
//! ```json
//! { "driver": "sqlite3", "data_source": "/var/lib/ocspgen/certs.db" }
//! ```
//!
//! Resolution order:
//! 1. The JSON file named by `--db-config`
//! 2. Environment variables (`OCSPGEN_DB_DATA_SOURCE`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Drivers accepted in the `driver` field. Both spellings select `SQLite`.
pub const SUPPORTED_DRIVERS: &[&str] = &["sqlite3", "sqlite"];

/// Environment variable overriding `data_source`.
pub const DATA_SOURCE_ENV: &str = "OCSPGEN_DB_DATA_SOURCE";

/// Certificate store locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub driver: String,
    pub data_source: PathBuf,
}

impl DbConfig {
    /// Reject drivers other than `SQLite` and empty data sources.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_DRIVERS.contains(&self.driver.as_str()) {
            return Err(Error::Config(format!(
                "Unsupported database driver '{}' (expected one of: {})",
                self.driver,
                SUPPORTED_DRIVERS.join(", ")
            )));
        }
        if self.data_source.as_os_str().is_empty() {
            return Err(Error::Config("Database data_source is empty".to_string()));
        }
        Ok(())
    }
}

/// Load and validate a store configuration file, applying env overrides.
pub fn load_db_config(path: &Path) -> Result<DbConfig> {
    let mut config = load_config_file(path)?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<DbConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read DB config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse DB config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut DbConfig) {
    if let Ok(val) = std::env::var(DATA_SOURCE_ENV) {
        if !val.is_empty() {
            config.data_source = PathBuf::from(val);
        }
    }
}
