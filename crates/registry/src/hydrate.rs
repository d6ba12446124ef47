use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use {
    async_trait::async_trait,
    duckrow_common::Warned,
    duckrow_git::{CloneError, GitExecutor},
    duckrow_skills::parse_registry_source,
    futures::future::join_all,
    tokio::sync::Semaphore,
    tracing::{debug, warn},
};

use crate::store::RegistrySkill;

/// Manifest `source` string to commit. Rebuilt on every load, never stored.
pub type RegistryCommitMap = BTreeMap<String, String>;

/// Remote lookups in flight at once.
const MAX_IN_FLIGHT: usize = 8;

/// Remote head lookup without a clone.
#[async_trait]
pub trait HeadResolver: Send + Sync {
    async fn remote_head(
        &self,
        url: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, CloneError>;
}

#[async_trait]
impl HeadResolver for GitExecutor {
    async fn remote_head(
        &self,
        url: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, CloneError> {
        self.ls_remote(url, git_ref).await
    }
}

/// Resolves unpinned catalog entries to commits, best-effort.
pub struct CommitHydrator {
    resolver: Arc<dyn HeadResolver>,
    overrides: BTreeMap<String, String>,
}

impl CommitHydrator {
    pub fn new(resolver: Arc<dyn HeadResolver>) -> Self {
        Self {
            resolver,
            overrides: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Build the commit map for a catalog.
    ///
    /// Pinned entries are copied straight in. Unpinned entries are looked up
    /// remotely, once per distinct clone URL and ref; lookups that fail are
    /// reported as warnings and leave the entry out of the map.
    pub async fn hydrate(&self, skills: &[RegistrySkill]) -> Warned<RegistryCommitMap> {
        let mut out = Warned::new(RegistryCommitMap::new());
        // (clone url, ref) -> manifest sources needing it
        let mut pending: HashMap<(String, Option<String>), Vec<String>> = HashMap::new();

        for skill in skills {
            let entry = &skill.entry;
            if let Some(commit) = entry.pinned_commit() {
                out.value.insert(entry.source.clone(), commit.to_string());
                continue;
            }
            match parse_registry_source(&entry.source, entry.version.as_deref()) {
                Ok(parsed) => {
                    let parsed = parsed.with_overrides(&self.overrides);
                    pending
                        .entry((parsed.clone_url, parsed.git_ref))
                        .or_default()
                        .push(entry.source.clone());
                },
                Err(e) => out.warn(format!("{}/{}: {e}", skill.registry, entry.name)),
            }
        }

        let permits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
        let lookups = pending.into_iter().map(|((url, git_ref), sources)| {
            let permits = Arc::clone(&permits);
            let resolver = Arc::clone(&self.resolver);
            async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => resolver.remote_head(&url, git_ref.as_deref()).await,
                    Err(_) => Ok(None),
                };
                (url, git_ref, sources, result)
            }
        });

        for (url, git_ref, sources, result) in join_all(lookups).await {
            match result {
                Ok(Some(commit)) => {
                    debug!(%url, git_ref = ?git_ref, %commit, "hydrated commit");
                    for source in sources {
                        out.value.insert(source, commit.clone());
                    }
                },
                Ok(None) => out.warn(format!(
                    "{url}: ref '{}' not found",
                    git_ref.as_deref().unwrap_or("HEAD")
                )),
                Err(e) => {
                    warn!(%url, error = %e, "commit lookup failed");
                    out.warn(format!("{url}: {}", e.kind));
                },
            }
        }
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::manifest::SkillEntry,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct FakeRemote {
        heads: BTreeMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HeadResolver for FakeRemote {
        async fn remote_head(
            &self,
            url: &str,
            git_ref: Option<&str>,
        ) -> Result<Option<String>, CloneError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = match git_ref {
                Some(r) => format!("{url}#{r}"),
                None => url.to_string(),
            };
            match self.heads.get(&key) {
                Some(c) => Ok(Some(c.clone())),
                None => Err(CloneError::from_output(
                    format!("git ls-remote {url} HEAD"),
                    url,
                    "fatal: unable to access: Could not resolve host: nowhere",
                )),
            }
        }
    }

    fn skill(name: &str, source: &str, commit: Option<&str>) -> RegistrySkill {
        RegistrySkill {
            registry: "team".into(),
            repo: "https://github.com/acme/registry.git".into(),
            entry: SkillEntry {
                name: name.into(),
                description: String::new(),
                source: source.into(),
                version: None,
                commit: commit.map(String::from),
            },
        }
    }

    fn remote(heads: &[(&str, &str)]) -> Arc<FakeRemote> {
        Arc::new(FakeRemote {
            heads: heads
                .iter()
                .map(|(u, c)| ((*u).to_string(), (*c).to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn pinned_entries_skip_lookup() {
        let fake = remote(&[]);
        let map = CommitHydrator::new(fake.clone())
            .hydrate(&[skill("lint", "github.com/acme/skills/lint", Some("1111"))])
            .await;
        assert_eq!(map.value["github.com/acme/skills/lint"], "1111");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
        assert!(!map.has_warnings());
    }

    #[tokio::test]
    async fn one_lookup_per_repo_and_failures_are_isolated() {
        let fake = remote(&[("https://github.com/acme/skills.git", "2222")]);
        let map = CommitHydrator::new(fake.clone())
            .hydrate(&[
                skill("review", "github.com/acme/skills/review", None),
                skill("lint", "github.com/acme/skills/lint", None),
                skill("broken", "nowhere.example/x/y", None),
                skill("bad", "not a source", None),
            ])
            .await;
        assert_eq!(map.value["github.com/acme/skills/review"], "2222");
        assert_eq!(map.value["github.com/acme/skills/lint"], "2222");
        assert!(!map.value.contains_key("nowhere.example/x/y"));
        assert_eq!(map.warnings.len(), 2);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overrides_redirect_lookups() {
        let fake = remote(&[("https://mirror/acme/skills.git", "3333")]);
        let map = CommitHydrator::new(fake)
            .with_overrides(BTreeMap::from([(
                "acme/skills".to_string(),
                "https://mirror/acme/skills.git".to_string(),
            )]))
            .hydrate(&[skill("review", "github.com/acme/skills/review", None)])
            .await;
        assert_eq!(map.value["github.com/acme/skills/review"], "3333");
    }

    #[tokio::test]
    async fn versions_resolve_separately() {
        let url = "https://github.com/acme/skills.git";
        let fake = remote(&[
            (url, "head"),
            ("https://github.com/acme/skills.git#v1", "tagged"),
        ]);
        let mut v1 = skill("lint", "github.com/acme/skills/lint", None);
        v1.entry.version = Some("v1".into());
        let map = CommitHydrator::new(fake.clone())
            .hydrate(&[v1, skill("review", "github.com/acme/skills/review", None)])
            .await;
        assert_eq!(map.value["github.com/acme/skills/lint"], "tagged");
        assert_eq!(map.value["github.com/acme/skills/review"], "head");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
    }
}
