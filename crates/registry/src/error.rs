use std::path::PathBuf;

use duckrow_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid registry manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Clone(#[from] duckrow_git::CloneError),

    #[error(transparent)]
    Config(#[from] duckrow_config::Error),

    #[error("registry '{0}' not found")]
    NotFound(String),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn as_clone_error(&self) -> Option<&duckrow_git::CloneError> {
        match self {
            Self::Clone(e) => Some(e),
            _ => None,
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

duckrow_common::impl_context!();
