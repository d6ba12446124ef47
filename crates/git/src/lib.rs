//! Git subprocess execution: clone, pull, checkout, HEAD and remote-head lookup.
//!
//! Every failure leaving this crate is a classified [`CloneError`] carrying the
//! exact command, its output, the URL, and user-facing hints.

pub mod error;
pub mod executor;

pub use {
    error::{CloneError, CloneErrorKind, classify},
    executor::{CloneRequest, DEFAULT_TIMEOUT, GitExecutor},
};
