//! Configuration loading for the trailcap field recorder.
//!
//! This crate is imported by every other trailcap crate, so it keeps its
//! dependencies minimal and knows nothing about stores or hardware beyond the
//! plain values they are configured with.
//!
//! # Usage
//!
//! ```rust,no_run
//! use trailconf::SystemConfig;
//!
//! let config = SystemConfig::load().expect("Failed to load config");
//!
//! println!("system {} on board {}", config.system.id, config.system.board);
//! for (name, type_id) in config.sensor_types() {
//!     println!("sensor {} has type {}", name, type_id);
//! }
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/trailcap/config.toml` (system)
//! 2. `~/.config/trailcap/config.toml` (user)
//! 3. `./trailcap.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`TRAILCAP_*`)
//!
//! # Example Config
//!
//! ```toml
//! [system]
//! id = "6f1c2f0e-31a4-4f7e-9d55-0d6a3b1f9c11"
//! board = "mock"
//! frequency = 29.97
//!
//! [store]
//! kind = "table"
//! compress = true
//! endpoint = "http://127.0.0.1:8000"
//!
//! [sensors."Front Fork"]
//! binding = "0b8c7e4a-0f1d-4c53-8d0e-2d0f5b2e8a61"
//! type = "fe3c4af2-feb4-4c9b-a717-2d0db3052293"
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{SensorSection, StoreKind, StoreSection, SystemSection, TelemetrySection};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete system configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    /// Identity, board and sampling rate of this device.
    #[serde(default)]
    pub system: SystemSection,

    /// Where captures are persisted.
    #[serde(default)]
    pub store: StoreSection,

    /// Sensor name to binding/type, keyed by the user-facing sensor name.
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorSection>,

    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl SystemConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/trailcap/config.toml`
    /// 3. `~/.config/trailcap/config.toml`
    /// 4. `./trailcap.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file taking the place of `./trailcap.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from an optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            merged = loader::merge_tables(merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Parse a single TOML document (no discovery, no env overrides).
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            contents
                .parse()
                .map_err(|e: toml::de::Error| ConfigError::Parse {
                    path: PathBuf::from("<string>"),
                    message: e.to_string(),
                })?;
        let config = loader::from_table(table, Path::new("<string>"))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frequency = self.system.frequency;
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "system.frequency must be a positive number of Hz, got {}",
                frequency
            )));
        }
        Ok(())
    }

    /// Names of all configured sensors.
    pub fn sensor_names(&self) -> BTreeSet<String> {
        self.sensors.keys().cloned().collect()
    }

    /// Sensor name to the serial UUID of the physical sensor it is bound to.
    pub fn sensor_bindings(&self) -> BTreeMap<String, Uuid> {
        self.sensors
            .iter()
            .map(|(name, sensor)| (name.clone(), sensor.binding))
            .collect()
    }

    /// Sensor name to the UUID identifying its sensor type (and raw encoding).
    pub fn sensor_types(&self) -> BTreeMap<String, Uuid> {
        self.sensors
            .iter()
            .map(|(name, sensor)| (name.clone(), sensor.type_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[system]
id = "6f1c2f0e-31a4-4f7e-9d55-0d6a3b1f9c11"
board = "mock"
frequency = 29.9

[sensors."Sensor One"]
binding = "0b8c7e4a-0f1d-4c53-8d0e-2d0f5b2e8a61"
type = "3906c164-82c8-48f8-a154-a39a9d0269fa"

[sensors."Sensor Two"]
binding = "1c9d8f5b-1a2e-4d64-9e1f-3e1a6c3f9b72"
type = "3906c164-82c8-48f8-a154-a39a9d0269fa"
"#;

    #[test]
    fn test_default_config() {
        let config = SystemConfig::default();
        assert_eq!(config.system.board, "mock");
        assert!(config.system.id.is_nil());
        assert!(config.sensors.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sensor_views_agree() {
        let config = SystemConfig::from_toml_str(SAMPLE).unwrap();

        let names = config.sensor_names();
        let types = config.sensor_types();
        let bindings = config.sensor_bindings();

        assert_eq!(names.len(), 2);
        assert_eq!(names, types.keys().cloned().collect::<BTreeSet<_>>());
        assert_eq!(names, bindings.keys().cloned().collect::<BTreeSet<_>>());
        assert_eq!(
            types["Sensor One"],
            Uuid::parse_str("3906c164-82c8-48f8-a154-a39a9d0269fa").unwrap()
        );
    }

    #[test]
    fn test_rejects_non_positive_frequency() {
        let result = SystemConfig::from_toml_str("[system]\nfrequency = 0.0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error_names_source() {
        let result = SystemConfig::from_toml_str("[system\nboard = ");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
