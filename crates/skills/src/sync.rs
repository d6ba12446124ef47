//! Install, update, and restore operations that keep the lock file in step
//! with what is on disk.
//!
//! The lock entry is always written last, after the copy and links exist.

use std::{collections::BTreeMap, path::Path};

use {
    duckrow_agents::CANONICAL_SKILLS_DIR,
    duckrow_common::Warned,
    duckrow_lock::{AssetKind, LockStore, SkillLockEntry},
    tracing::{info, warn},
};

use crate::{
    error::{Error, Result},
    install::Installer,
    remove::{Removal, Remover},
    source::{ParsedSource, parse_source},
    types::{BatchResult, InstallOptions, InstalledSkill},
};

/// Installer and remover bound to a set of clone URL overrides.
#[derive(Clone, Default)]
pub struct SkillManager {
    installer: Installer,
    remover: Remover,
    overrides: BTreeMap<String, String>,
}

impl SkillManager {
    pub fn new(installer: Installer) -> Self {
        let remover = Remover::new(installer.agents());
        Self {
            installer,
            remover,
            overrides: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: BTreeMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Parse `source` and apply overrides.
    pub fn resolve(&self, source: &str) -> Result<ParsedSource> {
        Ok(parse_source(source)?.with_overrides(&self.overrides))
    }

    /// Install from `source` and record each skill in `lock` when given.
    pub async fn install(
        &self,
        source: &str,
        opts: &InstallOptions,
        lock: Option<&LockStore>,
    ) -> Result<Vec<InstalledSkill>> {
        let parsed = self.resolve(source)?;
        self.install_parsed(&parsed, source, opts, lock).await
    }

    /// Install an already-resolved source (e.g. a registry entry).
    pub async fn install_parsed(
        &self,
        parsed: &ParsedSource,
        source_label: &str,
        opts: &InstallOptions,
        lock: Option<&LockStore>,
    ) -> Result<Vec<InstalledSkill>> {
        let installed = self.installer.install(parsed, source_label, opts).await?;
        if let Some(lock) = lock {
            for skill in &installed {
                lock.add_or_update_skill(lock_entry(skill))?;
            }
        }
        Ok(installed)
    }

    /// Remove a skill, and its lock entry when `lock` is given.
    pub fn uninstall(
        &self,
        name: &str,
        target_dir: &Path,
        lock: Option<&LockStore>,
    ) -> Result<Warned<Removal>> {
        let removal = self.remover.remove(name, target_dir)?;
        if let Some(lock) = lock {
            lock.remove_entry(AssetKind::Skill, name)?;
        }
        Ok(removal)
    }

    /// Replace an installed skill with the one at `commit` (or the source's
    /// current head when `None`).
    ///
    /// Runs remove, reinstall, relock in that order. This is not atomic: if
    /// the reinstall fails the lock entry still names the removed skill
    /// until `sync` or another update restores it.
    pub async fn update(
        &self,
        name: &str,
        target_dir: &Path,
        commit: Option<&str>,
        lock: &LockStore,
    ) -> Result<InstalledSkill> {
        let entry = lock
            .read()?
            .find_skill(name)
            .cloned()
            .ok_or_else(|| Error::message(format!("skill '{name}' is not in the lock file")))?;

        let removal = self.remover.remove(name, target_dir)?;
        for w in &removal.warnings {
            warn!(skill = %name, warning = %w, "update: removal warning");
        }

        let installed = self
            .reinstall(&entry, target_dir, commit.map(String::from))
            .await?;
        lock.add_or_update_skill(lock_entry(&installed))?;
        info!(skill = %name, from = %entry.commit, to = %installed.commit, "updated skill");
        Ok(installed)
    }

    /// Update each `(name, commit)` pair independently.
    pub async fn update_all<I>(&self, target_dir: &Path, updates: I, lock: &LockStore) -> BatchResult
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let mut batch = BatchResult::default();
        for (name, commit) in updates {
            match self.update(&name, target_dir, commit.as_deref(), lock).await {
                Ok(_) => batch.succeeded += 1,
                Err(e) => {
                    warn!(skill = %name, error = %e, "update failed");
                    batch.record_failure(name, e);
                },
            }
        }
        batch
    }

    /// Reinstall every locked skill whose canonical copy is missing, at its
    /// pinned commit. Skills already on disk are skipped.
    pub async fn sync(&self, target_dir: &Path, lock: &LockStore) -> Result<BatchResult> {
        let entries = lock.read()?.skills;
        let mut batch = BatchResult::default();
        for entry in entries {
            if target_dir
                .join(CANONICAL_SKILLS_DIR)
                .join(&entry.name)
                .is_dir()
            {
                batch.skipped += 1;
                continue;
            }
            let commit = Some(entry.commit.clone()).filter(|c| !c.is_empty());
            match self.reinstall(&entry, target_dir, commit).await {
                Ok(_) => batch.succeeded += 1,
                Err(e) => {
                    warn!(skill = %entry.name, error = %e, "sync failed");
                    batch.record_failure(entry.name.clone(), e);
                },
            }
        }
        info!(
            succeeded = batch.succeeded,
            failed = batch.failed,
            skipped = batch.skipped,
            "synced skills from lock file"
        );
        Ok(batch)
    }

    async fn reinstall(
        &self,
        entry: &SkillLockEntry,
        target_dir: &Path,
        commit: Option<String>,
    ) -> Result<InstalledSkill> {
        let mut parsed = self.resolve(&entry.source)?;
        if parsed.git_ref.is_none() {
            parsed.git_ref = entry.git_ref.clone();
        }
        let opts = InstallOptions {
            target_dir: target_dir.to_path_buf(),
            asset_filter: Some(entry.name.clone()),
            include_internal: false,
            target_agents: entry.agents.clone(),
            commit,
            is_internal: true,
        };
        self.installer
            .install(&parsed, &entry.source, &opts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::AssetNotFound {
                name: entry.name.clone(),
                origin: entry.source.clone(),
            })
    }
}

pub fn lock_entry(skill: &InstalledSkill) -> SkillLockEntry {
    SkillLockEntry {
        name: skill.name.clone(),
        source: skill.source.clone(),
        commit: skill.commit.clone(),
        git_ref: skill.git_ref.clone(),
        agents: skill.agents.clone(),
    }
}
