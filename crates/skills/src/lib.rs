//! Skill sources, discovery, installation, and removal.
//!
//! Skills are directories containing a `SKILL.md` file with YAML frontmatter
//! and markdown instructions. Installed copies live in
//! `<project>/.agents/skills/<name>/`; agents with their own convention get a
//! symlink pointing back at that canonical copy.

pub mod discover;
pub mod error;
pub mod fetch;
pub mod install;
pub mod parse;
pub mod remove;
pub mod source;
pub mod sync;
pub mod types;

pub use {
    error::{Error, Result},
    fetch::{FetchedTree, GitFetcher, RepoFetcher},
    install::Installer,
    remove::{Removal, Remover},
    source::{ParsedSource, SourceType, parse_registry_source, parse_source},
    sync::{SkillManager, lock_entry},
    types::{BatchResult, InstallOptions, InstalledSkill, SkillMetadata},
};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod test_support;
