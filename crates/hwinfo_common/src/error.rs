//! Error types for hwinfo.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HwInfoError {
    #[error("Failed to run {program}: {source}")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HwInfoError>;

/// Outcome of extracting a single typed field from a raw property bag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("field is absent")]
    Absent,

    #[error("field {key} is malformed: {reason}")]
    Malformed { key: String, reason: String },
}

impl FieldError {
    pub fn malformed(key: &str, reason: impl Into<String>) -> Self {
        FieldError::Malformed {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FieldError::Absent)
    }
}
