use std::fmt;

use serde::{Deserialize, Serialize};

pub const LOCK_VERSION: u32 = 1;

/// Kind of installed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Skill,
    Mcp,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skill => "skill",
            Self::Mcp => "mcp",
        })
    }
}

/// Top-level lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFile {
    #[serde(default = "current_lock_version")]
    pub lock_version: u32,
    #[serde(default)]
    pub skills: Vec<SkillLockEntry>,
    #[serde(default)]
    pub mcps: Vec<McpLockEntry>,
}

fn current_lock_version() -> u32 {
    LOCK_VERSION
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            lock_version: LOCK_VERSION,
            skills: Vec::new(),
            mcps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillLockEntry {
    /// Directory name under `.agents/skills/`.
    pub name: String,
    /// Source string as given at install time (e.g. `acme/skills@review`).
    pub source: String,
    /// Installed commit. Empty for local sources.
    #[serde(default)]
    pub commit: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpLockEntry {
    pub name: String,
    /// Name of the registry the entry came from.
    pub registry: String,
    /// Hash of the normalized server definition written to agent configs.
    pub config_hash: String,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_env: Vec<String>,
}

/// Uniform view over lock entries of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledAsset {
    pub kind: AssetKind,
    pub name: String,
    pub source: String,
    pub commit: String,
    pub git_ref: Option<String>,
    pub target_agents: Vec<String>,
}

impl LockFile {
    pub fn find_skill(&self, name: &str) -> Option<&SkillLockEntry> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn find_mcp(&self, name: &str) -> Option<&McpLockEntry> {
        self.mcps.iter().find(|m| m.name == name)
    }

    /// Insert or replace by name. Returns `true` if an entry was replaced.
    pub fn upsert_skill(&mut self, entry: SkillLockEntry) -> bool {
        if let Some(existing) = self.skills.iter_mut().find(|s| s.name == entry.name) {
            *existing = entry;
            return true;
        }
        self.skills.push(entry);
        false
    }

    pub fn upsert_mcp(&mut self, entry: McpLockEntry) -> bool {
        if let Some(existing) = self.mcps.iter_mut().find(|m| m.name == entry.name) {
            *existing = entry;
            return true;
        }
        self.mcps.push(entry);
        false
    }

    pub fn remove(&mut self, kind: AssetKind, name: &str) -> bool {
        let before = self.len();
        match kind {
            AssetKind::Skill => self.skills.retain(|s| s.name != name),
            AssetKind::Mcp => self.mcps.retain(|m| m.name != name),
        }
        self.len() != before
    }

    pub fn len(&self) -> usize {
        self.skills.len() + self.mcps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First name that appears twice within one kind.
    pub fn first_duplicate(&self) -> Option<(AssetKind, &str)> {
        fn dup<'a>(mut names: Vec<&'a str>) -> Option<&'a str> {
            names.sort_unstable();
            names.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
        }
        dup(self.skills.iter().map(|s| s.name.as_str()).collect())
            .map(|n| (AssetKind::Skill, n))
            .or_else(|| {
                dup(self.mcps.iter().map(|m| m.name.as_str()).collect())
                    .map(|n| (AssetKind::Mcp, n))
            })
    }

    /// Sort entries by name for stable diffs.
    pub fn normalize(&mut self) {
        self.skills.sort_by(|a, b| a.name.cmp(&b.name));
        self.mcps.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn installed_assets(&self) -> Vec<InstalledAsset> {
        let skills = self.skills.iter().map(|s| InstalledAsset {
            kind: AssetKind::Skill,
            name: s.name.clone(),
            source: s.source.clone(),
            commit: s.commit.clone(),
            git_ref: s.git_ref.clone(),
            target_agents: s.agents.clone(),
        });
        let mcps = self.mcps.iter().map(|m| InstalledAsset {
            kind: AssetKind::Mcp,
            name: m.name.clone(),
            source: m.registry.clone(),
            commit: String::new(),
            git_ref: None,
            target_agents: m.agents.clone(),
        });
        skills.chain(mcps).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn skill(name: &str, commit: &str) -> SkillLockEntry {
        SkillLockEntry {
            name: name.into(),
            source: format!("acme/skills@{name}"),
            commit: commit.into(),
            git_ref: None,
            agents: vec!["claude-code".into()],
        }
    }

    #[test]
    fn upsert_replaces_by_name() {
        let mut lock = LockFile::default();
        assert!(!lock.upsert_skill(skill("review", "a")));
        assert!(lock.upsert_skill(skill("review", "b")));
        assert_eq!(lock.skills.len(), 1);
        assert_eq!(lock.find_skill("review").unwrap().commit, "b");
    }

    #[test]
    fn same_name_allowed_across_kinds() {
        let mut lock = LockFile::default();
        lock.upsert_skill(skill("github", "a"));
        lock.upsert_mcp(McpLockEntry {
            name: "github".into(),
            registry: "team".into(),
            config_hash: "h".into(),
            agents: vec![],
            required_env: vec![],
        });
        assert_eq!(lock.first_duplicate(), None);
        assert!(lock.remove(AssetKind::Mcp, "github"));
        assert!(lock.find_skill("github").is_some());
    }

    #[test]
    fn detects_duplicates() {
        let mut lock = LockFile::default();
        lock.skills.push(skill("x", "a"));
        lock.skills.push(skill("x", "b"));
        assert_eq!(lock.first_duplicate(), Some((AssetKind::Skill, "x")));
    }

    #[test]
    fn serializes_ref_key() {
        let mut entry = skill("review", "abc");
        entry.git_ref = Some("v1".into());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ref"], "v1");
        let lock = LockFile::default();
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["lockVersion"], 1);
    }

    #[test]
    fn hand_written_lock_without_version_parses() {
        let lock: LockFile =
            serde_json::from_str(r#"{"skills":[{"name":"review","source":"acme/skills"}]}"#)
                .unwrap();
        assert_eq!(lock.lock_version, LOCK_VERSION);
        assert_eq!(lock.find_skill("review").unwrap().commit, "");
    }
}
