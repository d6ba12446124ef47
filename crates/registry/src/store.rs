use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    async_trait::async_trait,
    duckrow_common::Warned,
    duckrow_config::{ConfigStore, RegistryConfig, repo_cache_key, sanitize_repo_url},
    duckrow_git::{CloneError, CloneRequest, GitExecutor},
    futures::future::join_all,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    manifest::{self, Manifest, McpEntry, SkillEntry},
};

/// Clone and pull operations a registry store needs.
#[async_trait]
pub trait RepoSync: Send + Sync {
    async fn clone_fresh(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError>;
    async fn pull(&self, dir: &Path, url: &str) -> std::result::Result<(), CloneError>;
}

#[async_trait]
impl RepoSync for GitExecutor {
    async fn clone_fresh(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError> {
        self.clone_repo(&CloneRequest::new(url, dest)).await
    }

    async fn pull(&self, dir: &Path, url: &str) -> std::result::Result<(), CloneError> {
        GitExecutor::pull(self, dir, url).await
    }
}

/// A skill entry tagged with the registry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySkill {
    pub registry: String,
    pub repo: String,
    #[serde(flatten)]
    pub entry: SkillEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryMcp {
    pub registry: String,
    pub repo: String,
    #[serde(flatten)]
    pub entry: McpEntry,
}

/// Outcome of refreshing one registry in a batch.
#[derive(Debug)]
pub struct RefreshResult {
    pub name: String,
    pub repo: String,
    pub outcome: Result<Warned<Manifest>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryInfo {
    pub name: String,
    pub repo: String,
    pub path: PathBuf,
    pub cloned: bool,
    pub manifest_name: String,
    pub description: String,
    pub skills: usize,
    pub mcps: usize,
}

/// One local clone per registry under a cache root.
///
/// Refreshing the same registry concurrently is not guarded; callers
/// serialize that themselves.
#[derive(Clone)]
pub struct RegistryStore {
    root: PathBuf,
    sync: Arc<dyn RepoSync>,
}

impl RegistryStore {
    pub fn new(root: impl Into<PathBuf>, sync: Arc<dyn RepoSync>) -> Self {
        Self {
            root: root.into(),
            sync,
        }
    }

    /// Store rooted at the config directory's `registries/`, using git.
    pub fn for_config(config: &ConfigStore, git: GitExecutor) -> Self {
        Self::new(config.registries_dir(), Arc::new(git))
    }

    /// Deterministic clone directory for a repo URL.
    pub fn cache_dir(&self, repo_url: &str) -> PathBuf {
        self.root.join(repo_cache_key(repo_url))
    }

    /// Clone a registry, parse its manifest, and record it in config.
    ///
    /// The name defaults to the manifest's `name`, then to the sanitized URL.
    pub async fn add(
        &self,
        config: &ConfigStore,
        repo_url: &str,
        name: Option<&str>,
    ) -> Result<Warned<Manifest>> {
        let repo_url = repo_url.trim();
        if config.load()?.find_registry(repo_url).is_some() {
            return Err(duckrow_config::Error::DuplicateRegistry {
                name: repo_url.to_string(),
            }
            .into());
        }

        let dest = self.cache_dir(repo_url);
        remove_dir_if_exists(&dest)?;
        std::fs::create_dir_all(&self.root)?;
        self.sync.clone_fresh(repo_url, &dest).await?;

        let manifest = match manifest::load_manifest(&dest) {
            Ok(m) => m,
            Err(e) => {
                self.discard_clone(&dest);
                return Err(e);
            },
        };

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .or_else(|| Some(manifest.value.name.trim().to_string()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| sanitize_repo_url(repo_url));
        if let Err(e) = config.update(|c| c.add_registry(&name, repo_url)) {
            self.discard_clone(&dest);
            return Err(e.into());
        }

        info!(
            registry = %name,
            repo = %repo_url,
            skills = manifest.value.skills.len(),
            mcps = manifest.value.mcps.len(),
            "added registry"
        );
        Ok(manifest)
    }

    /// Pull an existing clone (cloning if it is missing) and re-parse.
    pub async fn refresh(&self, registry: &RegistryConfig) -> Result<Warned<Manifest>> {
        let dir = self.cache_dir(&registry.repo);
        if dir.join(".git").exists() {
            self.sync.pull(&dir, &registry.repo).await?;
        } else {
            debug!(registry = %registry.name, "clone missing, cloning again");
            remove_dir_if_exists(&dir)?;
            std::fs::create_dir_all(&self.root)?;
            self.sync.clone_fresh(&registry.repo, &dir).await?;
        }
        let manifest = manifest::load_manifest(&dir)?;
        info!(registry = %registry.name, "refreshed registry");
        Ok(manifest)
    }

    /// Refresh every registry. One failure never stops the others.
    pub async fn refresh_all(&self, registries: &[RegistryConfig]) -> Vec<RefreshResult> {
        let results = join_all(registries.iter().map(|r| async move {
            RefreshResult {
                name: r.name.clone(),
                repo: r.repo.clone(),
                outcome: self.refresh(r).await,
            }
        }))
        .await;

        for r in &results {
            if let Err(e) = &r.outcome {
                warn!(registry = %r.name, error = %e, "registry refresh failed");
            }
        }
        results
    }

    /// Drop a registry from config and delete its clone.
    pub fn remove(&self, config: &ConfigStore, name_or_repo: &str) -> Result<RegistryConfig> {
        let removed = config
            .update(|c| c.remove_registry(name_or_repo))
            .map_err(|e| match e {
                duckrow_config::Error::RegistryNotFound(n) => Error::NotFound(n),
                other => other.into(),
            })?;
        remove_dir_if_exists(&self.cache_dir(&removed.repo))?;
        info!(registry = %removed.name, "removed registry");
        Ok(removed)
    }

    /// Current manifest of an already-cloned registry.
    pub fn manifest(&self, registry: &RegistryConfig) -> Result<Warned<Manifest>> {
        manifest::load_manifest(&self.cache_dir(&registry.repo))
    }

    /// Every skill across registries, re-read from disk on each call.
    pub fn list_skills(&self, registries: &[RegistryConfig]) -> Warned<Vec<RegistrySkill>> {
        self.collect(registries, |reg, m| {
            m.skills
                .into_iter()
                .map(|entry| RegistrySkill {
                    registry: reg.name.clone(),
                    repo: reg.repo.clone(),
                    entry,
                })
                .collect()
        })
    }

    pub fn list_mcps(&self, registries: &[RegistryConfig]) -> Warned<Vec<RegistryMcp>> {
        self.collect(registries, |reg, m| {
            m.mcps
                .into_iter()
                .map(|entry| RegistryMcp {
                    registry: reg.name.clone(),
                    repo: reg.repo.clone(),
                    entry,
                })
                .collect()
        })
    }

    pub fn info(&self, registry: &RegistryConfig) -> RegistryInfo {
        let path = self.cache_dir(&registry.repo);
        let cloned = path.is_dir();
        let manifest = manifest::load_manifest(&path).map(|m| m.value).unwrap_or_default();
        RegistryInfo {
            name: registry.name.clone(),
            repo: registry.repo.clone(),
            path,
            cloned,
            manifest_name: manifest.name,
            description: manifest.description,
            skills: manifest.skills.len(),
            mcps: manifest.mcps.len(),
        }
    }

    fn collect<T>(
        &self,
        registries: &[RegistryConfig],
        f: impl Fn(&RegistryConfig, Manifest) -> Vec<T>,
    ) -> Warned<Vec<T>> {
        let mut out = Warned::new(Vec::new());
        for reg in registries {
            match self.manifest(reg) {
                Ok(m) => {
                    let (manifest, warnings) = m.into_parts();
                    out.warnings
                        .extend(warnings.into_iter().map(|w| format!("{}: {w}", reg.name)));
                    out.value.extend(f(reg, manifest));
                },
                Err(e) => out.warn(format!("{}: {e}", reg.name)),
            }
        }
        out
    }

    fn discard_clone(&self, dir: &Path) {
        if let Err(e) = remove_dir_if_exists(dir) {
            warn!(path = %dir.display(), error = %e, "failed to clean up registry clone");
        }
    }
}

fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use {super::*, std::collections::BTreeMap};

    /// Serves fixture trees by URL; unknown URLs fail like a missing repo.
    pub(crate) struct FixtureSync {
        repos: BTreeMap<String, String>,
    }

    impl FixtureSync {
        pub(crate) fn new(repos: &[(&str, &str)]) -> Self {
            Self {
                repos: repos
                    .iter()
                    .map(|(u, m)| ((*u).to_string(), (*m).to_string()))
                    .collect(),
            }
        }

        fn write(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError> {
            let Some(manifest) = self.repos.get(url) else {
                return Err(CloneError::from_output(
                    format!("git clone {url}"),
                    url,
                    "remote: Repository not found.",
                ));
            };
            std::fs::create_dir_all(dest.join(".git")).unwrap();
            std::fs::write(dest.join(manifest::MANIFEST_FILE), manifest).unwrap();
            Ok(())
        }
    }

    #[async_trait]
    impl RepoSync for FixtureSync {
        async fn clone_fresh(&self, url: &str, dest: &Path) -> std::result::Result<(), CloneError> {
            self.write(url, dest)
        }

        async fn pull(&self, dir: &Path, url: &str) -> std::result::Result<(), CloneError> {
            self.write(url, dir)
        }
    }

    pub(crate) const TEAM: &str = r#"{
        "name": "team",
        "skills": [
            {"name": "review", "source": "github.com/acme/skills/review"},
            {"name": "lint", "source": "github.com/acme/skills/lint", "commit": "1111"}
        ],
        "mcps": [{"name": "db", "command": "npx", "env": ["API_KEY=$API_KEY"]}]
    }"#;

    const OPS: &str = r#"{"name": "ops", "skills": [{"name": "review", "source": "github.com/ops/tools/review"}]}"#;

    fn setup(repos: &[(&str, &str)]) -> (tempfile::TempDir, ConfigStore, RegistryStore) {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConfigStore::new(tmp.path());
        let store = RegistryStore::new(config.registries_dir(), Arc::new(FixtureSync::new(repos)));
        (tmp, config, store)
    }

    #[tokio::test]
    async fn add_clones_and_records_registry() {
        let (_tmp, config, store) = setup(&[("https://github.com/acme/registry.git", TEAM)]);
        let m = store
            .add(&config, "https://github.com/acme/registry.git", None)
            .await
            .unwrap();
        assert_eq!(m.value.skills.len(), 2);

        let cfg = config.load().unwrap();
        assert_eq!(cfg.registries.len(), 1);
        assert_eq!(cfg.registries[0].name, "team");
        assert!(
            store
                .cache_dir("https://github.com/acme/registry.git")
                .join("duckrow.json")
                .is_file()
        );
    }

    #[tokio::test]
    async fn add_failure_is_classified_and_leaves_no_config() {
        let (_tmp, config, store) = setup(&[]);
        let err = store
            .add(&config, "https://github.com/acme/nope.git", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.as_clone_error().unwrap().kind,
            duckrow_git::CloneErrorKind::NotFound
        );
        assert!(config.load().unwrap().registries.is_empty());
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected() {
        let url = "https://github.com/acme/registry.git";
        let (_tmp, config, store) = setup(&[(url, TEAM)]);
        store.add(&config, url, Some("mine")).await.unwrap();
        assert!(matches!(
            store.add(&config, url, None).await,
            Err(Error::Config(duckrow_config::Error::DuplicateRegistry { .. }))
        ));
    }

    #[tokio::test]
    async fn refresh_all_isolates_failures() {
        let (_tmp, _config, store) = setup(&[("https://a/team.git", TEAM), ("https://b/ops.git", OPS)]);
        let regs = vec![
            RegistryConfig { name: "team".into(), repo: "https://a/team.git".into() },
            RegistryConfig { name: "gone".into(), repo: "https://c/gone.git".into() },
            RegistryConfig { name: "ops".into(), repo: "https://b/ops.git".into() },
        ];
        let results = store.refresh_all(&regs).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.outcome.is_ok()).count(), 2);
        let failed = results.iter().find(|r| r.outcome.is_err()).unwrap();
        assert_eq!(failed.name, "gone");
        assert!(failed.outcome.as_ref().unwrap_err().as_clone_error().is_some());
    }

    #[tokio::test]
    async fn listings_tag_entries_with_registry() {
        let (_tmp, _config, store) = setup(&[("https://a/team.git", TEAM), ("https://b/ops.git", OPS)]);
        let regs = vec![
            RegistryConfig { name: "team".into(), repo: "https://a/team.git".into() },
            RegistryConfig { name: "ops".into(), repo: "https://b/ops.git".into() },
            RegistryConfig { name: "never-cloned".into(), repo: "https://x/y.git".into() },
        ];
        store.refresh_all(&regs[..2]).await;

        let skills = store.list_skills(&regs);
        assert_eq!(skills.value.len(), 3);
        assert_eq!(skills.warnings.len(), 1);
        let reviews: Vec<_> = skills
            .value
            .iter()
            .filter(|s| s.entry.name == "review")
            .map(|s| s.registry.as_str())
            .collect();
        assert_eq!(reviews, vec!["team", "ops"]);

        let mcps = store.list_mcps(&regs[..1]);
        assert_eq!(mcps.value[0].repo, "https://a/team.git");
    }

    #[tokio::test]
    async fn remove_deletes_clone_and_config() {
        let url = "https://github.com/acme/registry.git";
        let (_tmp, config, store) = setup(&[(url, TEAM)]);
        store.add(&config, url, None).await.unwrap();

        let removed = store.remove(&config, "team").unwrap();
        assert_eq!(removed.repo, url);
        assert!(!store.cache_dir(url).exists());
        assert!(config.load().unwrap().registries.is_empty());
        assert!(matches!(store.remove(&config, "team"), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn info_reports_counts() {
        let url = "https://github.com/acme/registry.git";
        let (_tmp, config, store) = setup(&[(url, TEAM)]);
        store.add(&config, url, None).await.unwrap();
        let reg = config.load().unwrap().registries[0].clone();
        let info = store.info(&reg);
        assert!(info.cloned);
        assert_eq!((info.skills, info.mcps), (2, 1));
    }

    #[tokio::test]
    async fn lookalike_urls_keep_separate_clones() {
        let a = "https://github.com/acme-x/reg.git";
        let b = "https://github.com/acme/x-reg.git";
        let (_tmp, config, store) = setup(&[(a, TEAM), (b, OPS)]);
        store.add(&config, a, None).await.unwrap();
        store.add(&config, b, None).await.unwrap();
        assert_ne!(store.cache_dir(a), store.cache_dir(b));

        let regs = config.load().unwrap().registries;
        let skills = store.list_skills(&regs);
        let tagged: Vec<_> = skills
            .value
            .iter()
            .map(|s| (s.registry.as_str(), s.entry.source.as_str()))
            .collect();
        assert!(tagged.contains(&("team", "github.com/acme/skills/review")));
        assert!(tagged.contains(&("ops", "github.com/ops/tools/review")));
    }
}
