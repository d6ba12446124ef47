use std::collections::BTreeMap;

use {
    duckrow_lock::LockFile,
    duckrow_skills::{ParsedSource, parse_source},
    serde::Serialize,
};

use crate::hydrate::RegistryCommitMap;

/// Installed vs. available commit for one locked skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub name: String,
    pub source: String,
    pub installed_commit: String,
    /// Empty when the registry catalog has no match.
    pub available_commit: String,
    pub has_update: bool,
}

impl UpdateInfo {
    pub fn new(name: &str, source: &str, installed: &str, available: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            installed_commit: installed.to_string(),
            available_commit: available.to_string(),
            has_update: !available.is_empty() && installed != available,
        }
    }
}

/// Lookup tables over a commit map, from strictest to loosest.
struct Index<'a> {
    exact: &'a RegistryCommitMap,
    normalized: BTreeMap<String, &'a str>,
    /// (repo identity, last sub-path segment, commit)
    by_repo: Vec<(String, String, &'a str)>,
}

impl<'a> Index<'a> {
    fn new(map: &'a RegistryCommitMap) -> Self {
        let mut normalized = BTreeMap::new();
        let mut by_repo = Vec::new();
        for (source, commit) in map {
            let Ok(parsed) = parse_source(source) else {
                continue;
            };
            normalized
                .entry(parsed.normalized_key())
                .or_insert(commit.as_str());
            if let Some(last) = parsed.sub_path.as_deref().and_then(|s| s.rsplit('/').next()) {
                by_repo.push((parsed.repo_identity(), last.to_ascii_lowercase(), commit.as_str()));
            }
        }
        Self {
            exact: map,
            normalized,
            by_repo,
        }
    }

    /// Exact source first, then the normalized form, then same repo with a
    /// sub-path ending in the skill's name.
    fn lookup(&self, source: &str, name: &str) -> Option<&'a str> {
        if let Some(commit) = self.exact.get(source) {
            return Some(commit.as_str());
        }
        let parsed: ParsedSource = parse_source(source).ok()?;
        if let Some(commit) = self.normalized.get(&parsed.normalized_key()) {
            return Some(*commit);
        }
        let repo = parsed.repo_identity();
        let wanted: Vec<String> = [Some(name), parsed.asset_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::to_ascii_lowercase)
            .collect();
        self.by_repo
            .iter()
            .find(|(r, last, _)| *r == repo && wanted.contains(last))
            .map(|(_, _, commit)| *commit)
    }
}

/// One [`UpdateInfo`] per locked skill.
pub fn detect_updates(lock: &LockFile, commits: &RegistryCommitMap) -> Vec<UpdateInfo> {
    let index = Index::new(commits);
    lock.skills
        .iter()
        .map(|entry| {
            let available = index.lookup(&entry.source, &entry.name).unwrap_or_default();
            UpdateInfo::new(&entry.name, &entry.source, &entry.commit, available)
        })
        .collect()
}
