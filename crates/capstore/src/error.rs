//! Store failures.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by every [`CaptureStore`](crate::CaptureStore) operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("transport error talking to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("service rejected request ({code}): {message}")]
    Service { code: String, message: String },

    #[error("codec error for {key}: {message}")]
    Codec { key: Uuid, message: String },

    #[error("malformed data: {0}")]
    Malformed(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the capture lifecycle and its document format.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("capture document is malformed: {0}")]
    Document(#[from] serde_json::Error),

    #[error("capture document has no header")]
    MissingHeader,

    #[error("capture {0} is finalized")]
    Finalized(Uuid),

    #[error("sampling frequency must be a positive number of Hz, got {0}")]
    InvalidFrequency(f64),

    #[error("capture {id}: timestamp of sample {index} is out of range")]
    TimestampOutOfRange { id: Uuid, index: usize },

    #[error("no capture stored at {0}")]
    NotFound(Uuid),
}
