//! User configuration, on-disk layout, and `.env.duckrow` override files.
//!
//! The user config lives at `~/.duckrow/config.json`. Every component that
//! needs it receives a [`ConfigStore`] handle; there is no process-wide state.

pub mod env_file;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    env_file::{ENV_FILE_NAME, EnvFiles, EnvSource},
    error::{Error, Result},
    loader::{CONFIG_FILE_NAME, ConfigStore, default_config_dir, repo_cache_key, sanitize_repo_url},
    schema::{DuckrowConfig, FolderConfig, RegistryConfig, Settings},
};
