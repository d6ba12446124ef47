use duckrow_common::FromMessage;

/// Errors from resolving, fetching, and materializing skills.
///
/// `Clone` means the network step failed; `NoAssetsFound` and
/// `AssetNotFound` mean the fetch worked but the content did not match.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid source '{input}': {reason}")]
    InvalidSource { input: String, reason: String },

    #[error(transparent)]
    Clone(#[from] duckrow_git::CloneError),

    #[error("no skills found in '{origin}'")]
    NoAssetsFound { origin: String },

    #[error("skill '{name}' not found in '{origin}'")]
    AssetNotFound { name: String, origin: String },

    #[error("'{name}' matches several skills in '{origin}': {}", candidates.join(", "))]
    AmbiguousAsset {
        name: String,
        origin: String,
        candidates: Vec<String>,
    },

    #[error("invalid SKILL.md at {path}: {reason}")]
    InvalidSkill { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Walkdir(#[from] walkdir::Error),

    #[error(transparent)]
    Lock(#[from] duckrow_lock::Error),

    #[error(transparent)]
    Agents(#[from] duckrow_agents::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_source(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            input: input.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// The network step succeeded but the content did not match.
    pub fn is_post_clone(&self) -> bool {
        matches!(
            self,
            Self::NoAssetsFound { .. } | Self::AssetNotFound { .. } | Self::AmbiguousAsset { .. }
        )
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
