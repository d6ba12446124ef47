use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    error::{Context, Error, Result},
    types::{AssetKind, LOCK_VERSION, LockFile, McpLockEntry, SkillLockEntry},
};

pub const LOCK_FILE_NAME: &str = "duckrow.lock.json";

/// Lock file storage for one project root, with atomic writes.
///
/// A missing lock file is an untracked project, not an error.
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
}

impl LockStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store for `<project>/duckrow.lock.json`.
    pub fn for_project(project: &Path) -> Self {
        Self::new(project.join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the lock file, returning an empty one if missing.
    pub fn read(&self) -> Result<LockFile> {
        if !self.path.exists() {
            return Ok(LockFile::default());
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let lock: LockFile = serde_json::from_str(&data).map_err(|source| Error::Parse {
            path: self.path.clone(),
            source,
        })?;
        if lock.lock_version > LOCK_VERSION {
            return Err(Error::UnsupportedVersion {
                found: lock.lock_version,
                expected: LOCK_VERSION,
            });
        }
        if let Some((kind, name)) = lock.first_duplicate() {
            return Err(Error::DuplicateEntry {
                path: self.path.clone(),
                kind,
                name: name.to_string(),
            });
        }
        Ok(lock)
    }

    /// Write the lock file atomically via temp file + rename.
    pub fn write(&self, lock: &LockFile) -> Result<()> {
        let mut lock = lock.clone();
        lock.lock_version = LOCK_VERSION;
        lock.normalize();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut data = serde_json::to_string_pretty(&lock)?;
        data.push('\n');
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = lock.len(), "wrote lock file");
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut LockFile) -> T) -> Result<T> {
        let mut lock = self.read()?;
        let out = f(&mut lock);
        self.write(&lock)?;
        Ok(out)
    }

    pub fn add_or_update_skill(&self, entry: SkillLockEntry) -> Result<()> {
        let name = entry.name.clone();
        let replaced = self.modify(|lock| lock.upsert_skill(entry))?;
        info!(skill = %name, replaced, "recorded skill in lock file");
        Ok(())
    }

    pub fn add_or_update_mcp(&self, entry: McpLockEntry) -> Result<()> {
        let name = entry.name.clone();
        let replaced = self.modify(|lock| lock.upsert_mcp(entry))?;
        info!(mcp = %name, replaced, "recorded MCP in lock file");
        Ok(())
    }

    /// Remove an entry. Returns `false` (and leaves the file alone) if absent.
    pub fn remove_entry(&self, kind: AssetKind, name: &str) -> Result<bool> {
        if !self.exists() {
            return Ok(false);
        }
        let mut lock = self.read()?;
        if !lock.remove(kind, name) {
            return Ok(false);
        }
        self.write(&lock)?;
        info!(%kind, %name, "removed lock entry");
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn entry(name: &str) -> SkillLockEntry {
        SkillLockEntry {
            name: name.into(),
            source: format!("acme/skills@{name}"),
            commit: "0123456789abcdef0123456789abcdef01234567".into(),
            git_ref: Some("main".into()),
            agents: vec!["claude-code".into(), "cursor".into()],
        }
    }

    #[test]
    fn missing_lock_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        assert!(!store.exists());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn add_then_read_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        store.add_or_update_skill(entry("code-review")).unwrap();

        let lock = store.read().unwrap();
        assert_eq!(lock.find_skill("code-review"), Some(&entry("code-review")));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn remove_then_read_has_no_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        store.add_or_update_skill(entry("a")).unwrap();
        store.add_or_update_skill(entry("b")).unwrap();

        assert!(store.remove_entry(AssetKind::Skill, "a").unwrap());
        assert!(!store.remove_entry(AssetKind::Skill, "a").unwrap());
        let lock = store.read().unwrap();
        assert!(lock.find_skill("a").is_none());
        assert!(lock.find_skill("b").is_some());
    }

    #[test]
    fn remove_without_lock_file_does_not_create_one() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        assert!(!store.remove_entry(AssetKind::Mcp, "x").unwrap());
        assert!(!store.exists());
    }

    #[test]
    fn entries_are_sorted_on_write() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        store.add_or_update_skill(entry("zeta")).unwrap();
        store.add_or_update_skill(entry("alpha")).unwrap();
        let names: Vec<_> = store
            .read()
            .unwrap()
            .skills
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn hand_edited_duplicates_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        std::fs::write(
            store.path(),
            r#"{"lockVersion":1,"skills":[{"name":"x","source":"a/b"},{"name":"x","source":"c/d"}]}"#,
        )
        .unwrap();
        assert!(matches!(store.read(), Err(Error::DuplicateEntry { .. })));
    }

    #[test]
    fn newer_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LockStore::for_project(tmp.path());
        std::fs::write(store.path(), r#"{"lockVersion":99}"#).unwrap();
        assert!(matches!(
            store.read(),
            Err(Error::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn write_failure_is_surfaced() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("ro");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        let store = LockStore::for_project(&dir);
        let res = store.add_or_update_skill(entry("a"));
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
        // Root ignores directory permissions.
        if res.is_err() {
            assert!(matches!(res, Err(Error::Io(_))));
        }
    }
}
