//! Typed configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Identity and sampling parameters of this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSection {
    /// UUID recorded as the owning system of every capture.
    /// Default: nil (unset)
    #[serde(default)]
    pub id: Uuid,

    /// Board the platform is built for (`mock`, `udoo-neo`).
    /// Default: mock
    #[serde(default = "SystemSection::default_board")]
    pub board: String,

    /// Sampling frequency in Hz.
    /// Default: 29.97
    #[serde(default = "SystemSection::default_frequency")]
    pub frequency: f64,
}

impl SystemSection {
    fn default_board() -> String {
        "mock".to_string()
    }

    fn default_frequency() -> f64 {
        29.97
    }
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            board: Self::default_board(),
            frequency: Self::default_frequency(),
        }
    }
}

/// Which persistence backend holds captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    File,
    Table,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "table" => Ok(Self::Table),
            other => Err(format!("unknown store kind: {}", other)),
        }
    }
}

/// Capture store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Default: file
    #[serde(default = "StoreSection::default_kind")]
    pub kind: StoreKind,

    /// Compress blobs before they reach the backend.
    /// Default: true
    #[serde(default = "StoreSection::default_compress")]
    pub compress: bool,

    /// Base directory of the file backend.
    /// Default: ~/.local/share/trailcap/store
    #[serde(default = "StoreSection::default_path")]
    pub path: PathBuf,

    /// Endpoint of the table service.
    /// Default: http://127.0.0.1:8000
    #[serde(default = "StoreSection::default_endpoint")]
    pub endpoint: String,
}

impl StoreSection {
    fn default_kind() -> StoreKind {
        StoreKind::File
    }

    fn default_compress() -> bool {
        true
    }

    fn default_path() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/trailcap/store"))
            .unwrap_or_else(|| PathBuf::from(".local/share/trailcap/store"))
    }

    fn default_endpoint() -> String {
        "http://127.0.0.1:8000".to_string()
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: Self::default_kind(),
            compress: Self::default_compress(),
            path: Self::default_path(),
            endpoint: Self::default_endpoint(),
        }
    }
}

/// One configured sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSection {
    /// Serial UUID of the physical sensor this name is bound to.
    pub binding: Uuid,

    /// Sensor type UUID, identifying how its raw readings are encoded.
    #[serde(rename = "type")]
    pub type_id: Uuid,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    /// Default: info,trailcap=debug
    #[serde(default = "TelemetrySection::default_log_level")]
    pub log_level: String,
}

impl TelemetrySection {
    fn default_log_level() -> String {
        "info,trailcap=debug".to_string()
    }
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
