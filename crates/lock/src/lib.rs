//! Per-project lock file (`duckrow.lock.json`): what is installed, from where,
//! at which commit, for which agents.

pub mod error;
pub mod store;
pub mod types;

pub use {
    error::{Error, Result},
    store::{LOCK_FILE_NAME, LockStore},
    types::{AssetKind, InstalledAsset, LOCK_VERSION, LockFile, McpLockEntry, SkillLockEntry},
};
