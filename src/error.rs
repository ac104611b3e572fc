use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a [`SkinHost`](crate::host::SkinHost) primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Error, Debug)]
pub enum WeightError {
    /// The document is not well-formed XML or lacks the deformer/shape anchors.
    #[error("malformed weight file {origin}: {reason}")]
    Format { origin: String, reason: String },

    #[error("filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid request: {0}")]
    Precondition(String),

    #[error("host operation failed: {0}")]
    HostOperation(#[from] HostError),
}

impl WeightError {
    pub(crate) fn format(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        WeightError::Format {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WeightError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = WeightError> = std::result::Result<T, E>;
