use std::path::{Path, PathBuf};

use duckrow_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml_edit::TomlError),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("invalid config at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_config(path: &Path, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
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
