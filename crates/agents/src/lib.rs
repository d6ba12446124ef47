//! Agent conventions: where each coding agent looks for skills and MCP config.
//!
//! Core code never branches on a specific agent. It asks a [`System`] for its
//! capabilities (skills directory, MCP config path and format) and acts on them.

pub mod builtin;
pub mod error;
pub mod mcp_format;
pub mod system;

pub use {
    builtin::{Agents, BuiltinSystem},
    error::{Error, Result},
    mcp_format::{McpFormat, McpServerSpec, RemoteTransport},
    system::{CANONICAL_SKILLS_DIR, LinkOutcome, System},
};
