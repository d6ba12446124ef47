use std::path::PathBuf;

use duckrow_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse lock file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("lock file {path} lists {kind} '{name}' more than once")]
    DuplicateEntry {
        path: PathBuf,
        kind: crate::types::AssetKind,
        name: String,
    },

    #[error("unsupported lock file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{message}")]
    Message { message: String },
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

duckrow_common::impl_context!();
