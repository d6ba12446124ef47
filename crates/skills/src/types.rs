use std::path::PathBuf;

use serde::Serialize;

/// Frontmatter of a discovered `SKILL.md`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillMetadata {
    /// Directory name; this is the install name.
    pub dir_name: String,
    /// Display name from the frontmatter.
    pub name: String,
    pub description: String,
    /// Marked `metadata.internal: true`; skipped unless explicitly requested.
    pub internal: bool,
    /// Directory containing the SKILL.md.
    pub path: PathBuf,
}

impl SkillMetadata {
    /// Whether an asset filter names this skill's directory.
    pub fn matches_dir(&self, filter: &str) -> bool {
        self.dir_name.eq_ignore_ascii_case(filter)
    }

    /// Whether an asset filter names this skill's frontmatter `name`.
    pub fn matches_display_name(&self, filter: &str) -> bool {
        self.name.eq_ignore_ascii_case(filter)
    }
}

/// Options for [`crate::Installer::install`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Project root.
    pub target_dir: PathBuf,
    /// Install only the named asset.
    pub asset_filter: Option<String>,
    /// Install skills marked internal too.
    pub include_internal: bool,
    /// Agent ids that should see the skill.
    pub target_agents: Vec<String>,
    /// Check out exactly this commit.
    pub commit: Option<String>,
    /// The filtered asset is known to be internal (e.g. reinstall from a lock entry).
    pub is_internal: bool,
}

impl InstallOptions {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_asset(mut self, name: impl Into<String>) -> Self {
        self.asset_filter = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_agents<S: Into<String>>(mut self, agents: impl IntoIterator<Item = S>) -> Self {
        self.target_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    #[must_use]
    pub fn including_internal(mut self) -> Self {
        self.include_internal = true;
        self
    }
}

/// One materialized skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledSkill {
    pub name: String,
    /// Canonical copy under `.agents/skills/`.
    pub path: PathBuf,
    pub source: String,
    /// Empty for local sources.
    pub commit: String,
    pub git_ref: Option<String>,
    pub agents: Vec<String>,
}

/// Outcome of a batch operation where each item fails independently.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `(asset name, error message)` per failure.
    pub errors: Vec<(String, String)>,
}

impl BatchResult {
    pub fn record_failure(&mut self, name: impl Into<String>, err: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push((name.into(), err.to_string()));
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
