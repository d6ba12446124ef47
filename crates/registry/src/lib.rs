//! Git-hosted registries: local clones, manifests, commit hydration, and
//! update detection against a project's lock file.

pub mod error;
pub mod hydrate;
pub mod manifest;
pub mod store;
pub mod updates;

pub use {
    error::{Error, Result},
    hydrate::{CommitHydrator, HeadResolver, RegistryCommitMap},
    manifest::{MANIFEST_FILE, Manifest, McpEntry, McpType, SkillEntry},
    store::{RefreshResult, RegistryInfo, RegistryMcp, RegistrySkill, RegistryStore, RepoSync},
    updates::{UpdateInfo, detect_updates},
};
