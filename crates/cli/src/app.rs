use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    anyhow::{Context, Result},
    duckrow_agents::Agents,
    duckrow_config::{ConfigStore, DuckrowConfig, RegistryConfig},
    duckrow_git::GitExecutor,
    duckrow_lock::LockStore,
    duckrow_registry::{CommitHydrator, RegistryCommitMap, RegistryStore},
    duckrow_skills::{GitFetcher, Installer, SkillManager},
    tracing::{debug, warn},
};

use crate::output;

/// Everything a command needs, built once from the global flags.
pub struct App {
    pub config: ConfigStore,
    pub project: PathBuf,
    pub git: GitExecutor,
}

impl App {
    pub fn new(config_dir: Option<PathBuf>, project_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_dir {
            Some(dir) => ConfigStore::new(dir),
            None => ConfigStore::open_default()?,
        };
        let project = match project_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("failed to read current directory")?,
        };
        Ok(Self {
            config,
            project,
            git: GitExecutor::new(),
        })
    }

    #[must_use]
    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git = self.git.with_timeout(timeout);
        self
    }

    pub fn load_config(&self) -> Result<DuckrowConfig> {
        Ok(self.config.load()?)
    }

    pub fn overrides(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.load_config()?.settings.clone_url_overrides)
    }

    pub fn registries(&self) -> Result<Vec<RegistryConfig>> {
        Ok(self.load_config()?.registries)
    }

    pub fn lock(&self) -> LockStore {
        LockStore::for_project(&self.project)
    }

    pub fn skills(&self) -> Result<SkillManager> {
        let installer = Installer::new(Arc::new(GitFetcher::new(self.git.clone())));
        Ok(SkillManager::new(installer).with_overrides(self.overrides()?))
    }

    pub fn registry_store(&self) -> RegistryStore {
        RegistryStore::for_config(&self.config, self.git.clone())
    }

    /// Commit map for every skill in every configured registry.
    pub async fn commit_map(&self) -> Result<RegistryCommitMap> {
        let registries = self.registries()?;
        let catalog = self.registry_store().list_skills(&registries);
        output::print_warnings(&catalog.warnings);
        let hydrated = CommitHydrator::new(Arc::new(self.git.clone()))
            .with_overrides(self.overrides()?)
            .hydrate(&catalog.value)
            .await;
        for w in &hydrated.warnings {
            debug!(warning = %w, "commit hydration");
        }
        Ok(hydrated.value)
    }

    /// Agents named on the command line, else those detected in the project,
    /// else the canonical directory only.
    pub fn target_agents(&self, requested: &[String]) -> Vec<String> {
        if !requested.is_empty() {
            return requested.to_vec();
        }
        let detected: Vec<String> = Agents::builtin()
            .detect(&self.project)
            .into_iter()
            .map(|s| s.id().to_string())
            .collect();
        if detected.is_empty() {
            vec!["universal".to_string()]
        } else {
            detected
        }
    }

    /// Track the project folder when `autoAddCurrentDir` is on.
    pub fn remember_project(&self) {
        let path = absolute(&self.project);
        let result = self.config.update(|c| {
            if c.settings.auto_add_current_dir {
                c.add_folder(&path.to_string_lossy());
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to record project folder");
        }
    }
}

pub fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn app(tmp: &Path) -> App {
        App::new(Some(tmp.join("config")), Some(tmp.join("project"))).unwrap()
    }

    #[test]
    fn explicit_agents_win() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        assert_eq!(app.target_agents(&["cursor".into()]), vec!["cursor"]);
    }

    #[test]
    fn falls_back_to_detected_then_universal() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        std::fs::create_dir_all(&app.project).unwrap();
        assert_eq!(app.target_agents(&[]), vec!["universal"]);
        std::fs::create_dir_all(app.project.join(".cursor")).unwrap();
        assert_eq!(app.target_agents(&[]), vec!["cursor"]);
    }

    #[test]
    fn remembers_project_once() {
        let tmp = tempfile::tempdir().unwrap();
        let app = app(tmp.path());
        std::fs::create_dir_all(&app.project).unwrap();
        app.remember_project();
        app.remember_project();
        assert_eq!(app.load_config().unwrap().folders.len(), 1);
    }
}
