//! Kernel configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! JSON file named by `BINSTOCK_CONFIG`, and the `BINSTOCK_DB` /
//! `BINSTOCK_BUSY_TIMEOUT_MS` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use binstock_api::{ColumnCode, LocationId, NewCabinet};
use serde::{Deserialize, Serialize};

use crate::roles::{ROLE_SCREW, ROLE_STANDOFF, ROLE_WASHER};

/// Geometry given to cabinets created without explicit values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CabinetDefaults {
    pub rows_max: u32,
    pub cols_max: ColumnCode,
    pub compartments_per_slot: u32,
}

impl Default for CabinetDefaults {
    fn default() -> Self {
        Self {
            rows_max: 128,
            cols_max: ColumnCode::MAX,
            compartments_per_slot: 6,
        }
    }
}

impl CabinetDefaults {
    /// Fields for a new cabinet with this geometry.
    pub fn for_location(&self, location_id: LocationId, name: &str) -> NewCabinet {
        NewCabinet {
            location_id,
            name: name.to_string(),
            rows_max: self.rows_max,
            cols_max: self.cols_max,
            compartments_per_slot: self.compartments_per_slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// How long a writer waits for a competing transaction, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Capacity of the placement event channel.
    pub event_capacity: usize,
    pub cabinet_defaults: CabinetDefaults,
    /// Role name -> category name (matched case-insensitively).
    pub category_roles: HashMap<String, String>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let db_path = default_db_path().unwrap_or_else(|_| PathBuf::from("binstock.db"));
        Self {
            db_path,
            busy_timeout_ms: 5_000,
            event_capacity: 256,
            cabinet_defaults: CabinetDefaults::default(),
            category_roles: HashMap::from([
                (ROLE_WASHER.to_string(), "Washers".to_string()),
                (ROLE_SCREW.to_string(), "Screws".to_string()),
                (ROLE_STANDOFF.to_string(), "Standoffs".to_string()),
            ]),
        }
    }
}

impl KernelConfig {
    /// Load defaults, then the optional config file, then env overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os("BINSTOCK_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(db) = std::env::var_os("BINSTOCK_DB") {
            config.db_path = PathBuf::from(db);
        }
        if let Ok(raw) = std::env::var("BINSTOCK_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("BINSTOCK_BUSY_TIMEOUT_MS is not a number: {:?}", raw))?;
        }
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Same settings with a different database file.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Get the default database path (~/.binstock/binstock.db).
fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".binstock").join("binstock.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let defaults = CabinetDefaults::default();
        assert_eq!(defaults.rows_max, 128);
        assert_eq!(defaults.cols_max.code(), "ZZ");
        assert_eq!(defaults.compartments_per_slot, 6);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binstock.json");
        std::fs::write(
            &path,
            r#"{ "db_path": "/tmp/x.db", "cabinet_defaults": { "cols_max": "H" } }"#,
        )
        .unwrap();

        let config = KernelConfig::from_file(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.cabinet_defaults.cols_max.code(), "H");
        assert_eq!(config.cabinet_defaults.rows_max, 128);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.category_roles.contains_key(ROLE_WASHER));
    }

    #[test]
    fn test_from_file_rejects_bad_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "cabinet_defaults": { "cols_max": "abc" } }"#).unwrap();
        assert!(KernelConfig::from_file(&path).is_err());
    }
}
