//! Writing registry MCP entries into each agent's own config file.

pub mod env;
pub mod error;
pub mod hash;
pub mod writer;

pub use {
    env::{EnvResolver, EnvStatus, required_env},
    error::{Error, Result},
    hash::config_hash,
    writer::{DriftState, DriftStatus, McpInstall, McpWriter, server_spec},
};
