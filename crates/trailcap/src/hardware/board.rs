//! Board registry: which `Platform` to build for a configured board.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use trailconf::SystemConfig;

use super::mock::MockPlatform;
use super::{Platform, PlatformError};

/// System boards trailcap knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardKind {
    /// Simulated board; sensors follow the configured bindings.
    Mock,
    /// UDOO Neo field unit.
    UdooNeo,
}

impl BoardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::UdooNeo => "udoo-neo",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardKind {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "mock" => Ok(Self::Mock),
            "udoo-neo" | "udooneo" => Ok(Self::UdooNeo),
            _ => Err(BoardError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("unknown board {0:?}")]
    Unknown(String),

    #[error("no platform registered for board {0}")]
    Unregistered(BoardKind),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

pub type BoardConstructor = fn(&SystemConfig) -> Result<Arc<dyn Platform>, PlatformError>;

/// Explicit board → constructor table.
pub struct BoardRegistry {
    constructors: HashMap<BoardKind, BoardConstructor>,
}

impl BoardRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with every board built into this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(BoardKind::Mock, mock_board);
        registry
    }

    pub fn register(&mut self, kind: BoardKind, constructor: BoardConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn is_registered(&self, kind: BoardKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn build(&self, kind: BoardKind, config: &SystemConfig) -> Result<Arc<dyn Platform>, BoardError> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(BoardError::Unregistered(kind))?;
        let platform = constructor(config)?;
        info!("built platform for board {}", kind);
        Ok(platform)
    }

    /// Parse the configured board name and build it.
    pub fn build_configured(&self, config: &SystemConfig) -> Result<Arc<dyn Platform>, BoardError> {
        let kind: BoardKind = config.system.board.parse()?;
        self.build(kind, config)
    }
}

impl Default for BoardRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn mock_board(config: &SystemConfig) -> Result<Arc<dyn Platform>, PlatformError> {
    Ok(Arc::new(MockPlatform::from_config(config)))
}
