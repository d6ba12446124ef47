use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    duckrow_agents::{Agents, CANONICAL_SKILLS_DIR, LinkOutcome},
    tracing::{debug, info, warn},
};

use crate::{
    discover,
    error::{Context, Error, Result},
    fetch::{GitFetcher, RepoFetcher},
    source::ParsedSource,
    types::{InstallOptions, InstalledSkill, SkillMetadata},
};

/// Materializes skills from a source into a project.
///
/// Order per call: fetch, discover, copy, link. Nothing is written to the
/// project until the fetch has succeeded and discovery found something.
#[derive(Clone)]
pub struct Installer {
    fetcher: Arc<dyn RepoFetcher>,
    agents: &'static Agents,
}

impl Default for Installer {
    fn default() -> Self {
        Self::new(Arc::new(GitFetcher::default()))
    }
}

impl Installer {
    pub fn new(fetcher: Arc<dyn RepoFetcher>) -> Self {
        Self {
            fetcher,
            agents: Agents::builtin(),
        }
    }

    #[must_use]
    pub fn with_agents(mut self, agents: &'static Agents) -> Self {
        self.agents = agents;
        self
    }

    pub fn agents(&self) -> &'static Agents {
        self.agents
    }

    /// Install every matching skill from `source`.
    ///
    /// `source_label` is what gets recorded as the result's `source`
    /// (normally the string the user typed or the manifest entry's `source`).
    pub async fn install(
        &self,
        source: &ParsedSource,
        source_label: &str,
        opts: &InstallOptions,
    ) -> Result<Vec<InstalledSkill>> {
        let systems = self.agents.resolve(&opts.target_agents)?;

        let tree = self.fetcher.fetch(source, opts.commit.as_deref()).await?;
        let found = discover::discover(
            tree.root(),
            source.sub_path.as_deref(),
            &source.default_asset_name(),
        );
        if found.is_empty() {
            return Err(Error::NoAssetsFound {
                origin: source_label.to_string(),
            });
        }

        let selected = select(found, source, source_label, opts)?;
        let skills_dir = opts.target_dir.join(CANONICAL_SKILLS_DIR);
        std::fs::create_dir_all(&skills_dir)?;

        let mut installed = Vec::with_capacity(selected.len());
        for skill in selected {
            let dest = skills_dir.join(&skill.dir_name);
            replace_dir(&skill.path, &dest)?;

            for system in &systems {
                match system.install_skill(&opts.target_dir, &skill.dir_name)? {
                    LinkOutcome::Linked(link) => {
                        debug!(agent = system.id(), link = %link.display(), "agent link ready");
                    },
                    LinkOutcome::Canonical => {},
                    LinkOutcome::Unsupported => {
                        warn!(agent = system.id(), skill = %skill.dir_name, "agent has no skills directory");
                    },
                }
            }

            info!(
                skill = %skill.dir_name,
                source = %source_label,
                commit = %tree.commit(),
                agents = ?opts.target_agents,
                "installed skill"
            );
            installed.push(InstalledSkill {
                name: skill.dir_name,
                path: dest,
                source: source_label.to_string(),
                commit: tree.commit().to_string(),
                git_ref: source.git_ref.clone(),
                agents: opts.target_agents.clone(),
            });
        }
        Ok(installed)
    }
}

fn select(
    found: Vec<SkillMetadata>,
    source: &ParsedSource,
    source_label: &str,
    opts: &InstallOptions,
) -> Result<Vec<SkillMetadata>> {
    let filter = opts.asset_filter.as_deref().or(source.asset_name.as_deref());
    let allow_internal = opts.include_internal || opts.is_internal;
    let visible: Vec<_> = found
        .into_iter()
        .filter(|s| allow_internal || !s.internal)
        .collect();

    let Some(name) = filter else {
        if visible.is_empty() {
            return Err(Error::NoAssetsFound {
                origin: source_label.to_string(),
            });
        }
        return Ok(visible);
    };

    // Directory names win; the display name is only a fallback.
    let (by_dir, rest): (Vec<_>, Vec<_>) = visible.into_iter().partition(|s| s.matches_dir(name));
    let candidates = if by_dir.is_empty() {
        rest.into_iter()
            .filter(|s| s.matches_display_name(name))
            .collect()
    } else {
        by_dir
    };

    match candidates.len() {
        0 => Err(Error::AssetNotFound {
            name: name.to_string(),
            origin: source_label.to_string(),
        }),
        1 => Ok(candidates),
        _ => Err(Error::AmbiguousAsset {
            name: name.to_string(),
            origin: source_label.to_string(),
            candidates: candidates.into_iter().map(|s| s.dir_name).collect(),
        }),
    }
}

/// Replace `dest` with a copy of `src`, staging next to it first.
fn replace_dir(src: &Path, dest: &Path) -> Result<()> {
    let staging = staging_path(dest);
    remove_path(&staging)?;
    copy_dir_recursive(src, &staging)?;
    remove_path(dest)?;
    std::fs::rename(&staging, dest)
        .with_context(|| format!("failed to move skill into {}", dest.display()))?;
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.staging"))
}

pub(crate) fn remove_path(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy a skill directory verbatim. VCS metadata and symlinks are skipped.
fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    let walker = walkdir::WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} escaped {}", entry.path().display(), src.display()))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_symlink() {
            debug!(path = %entry.path().display(), "skipping symlink inside skill");
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
