//! Error and result helpers shared by every duckrow crate.

pub mod error;
pub mod warned;

pub use {error::FromMessage, warned::Warned};
