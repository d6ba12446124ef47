//! User config schema (`~/.duckrow/config.json`).
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckrowConfig {
    /// Project folders the user tracks.
    pub folders: Vec<FolderConfig>,
    /// Registries, in the order they were added.
    pub registries: Vec<RegistryConfig>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub path: String,
}

/// A registry is a git repository with a `duckrow.json` manifest at its root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub name: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Track the current working directory as a folder on first use.
    pub auto_add_current_dir: bool,
    /// `owner/repo` → clone URL. Redirects installs to a mirror without
    /// touching registry manifests.
    #[serde(rename = "cloneURLOverrides", alias = "cloneUrlOverrides")]
    pub clone_url_overrides: BTreeMap<String, String>,
    pub disable_all_telemetry: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_add_current_dir: true,
            clone_url_overrides: BTreeMap::new(),
            disable_all_telemetry: false,
        }
    }
}

impl DuckrowConfig {
    /// Add a registry. Names and repo URLs must both be unique.
    pub fn add_registry(&mut self, name: &str, repo: &str) -> Result<()> {
        if self
            .registries
            .iter()
            .any(|r| r.name == name || r.repo == repo)
        {
            return Err(Error::DuplicateRegistry { name: name.into() });
        }
        self.registries.push(RegistryConfig {
            name: name.into(),
            repo: repo.into(),
        });
        Ok(())
    }

    /// Remove a registry by name or repo URL, returning the removed entry.
    pub fn remove_registry(&mut self, name_or_repo: &str) -> Result<RegistryConfig> {
        let idx = self
            .registries
            .iter()
            .position(|r| r.name == name_or_repo || r.repo == name_or_repo)
            .ok_or_else(|| Error::RegistryNotFound(name_or_repo.into()))?;
        Ok(self.registries.remove(idx))
    }

    /// Find a registry by name or repo URL.
    pub fn find_registry(&self, name_or_repo: &str) -> Option<&RegistryConfig> {
        self.registries
            .iter()
            .find(|r| r.name == name_or_repo || r.repo == name_or_repo)
    }

    /// Track a folder. Returns `false` if it was already tracked.
    pub fn add_folder(&mut self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        if self.folders.iter().any(|f| f.path == path) {
            return false;
        }
        self.folders.push(FolderConfig { path: path.into() });
        true
    }

    pub fn remove_folder(&mut self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        let before = self.folders.len();
        self.folders.retain(|f| f.path != path);
        self.folders.len() != before
    }

    pub fn set_clone_url_override(&mut self, repo_key: &str, url: &str) {
        self.settings
            .clone_url_overrides
            .insert(repo_key.to_string(), url.to_string());
    }

    pub fn remove_clone_url_override(&mut self, repo_key: &str) -> bool {
        self.settings.clone_url_overrides.remove(repo_key).is_some()
    }
}
