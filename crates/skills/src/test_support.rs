use std::{
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, duckrow_git::CloneError};

use crate::{
    error::Result,
    fetch::{FetchedTree, RepoFetcher},
    source::ParsedSource,
};

/// Serves a fixture directory for every git source.
pub(crate) struct FixtureFetcher {
    root: PathBuf,
    commit: Mutex<String>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub(crate) fn new(root: &Path, commit: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            commit: Mutex::new(commit.to_string()),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(raw_output: &str) -> Self {
        Self {
            root: PathBuf::new(),
            commit: Mutex::new(String::new()),
            failure: Some(raw_output.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_commit(&self, commit: &str) {
        *self.commit.lock().unwrap() = commit.to_string();
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `code-review`, `lint`, an internal `helper`, and one skill nested too deep.
    pub(crate) fn sample_repo() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let write = |rel: &str, body: &str| {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        };
        write(
            "code-review/SKILL.md",
            "---\nname: code-review\ndescription: Review diffs\n---\nReview carefully.\n",
        );
        write("code-review/checklist.md", "- tests\n");
        write("lint/SKILL.md", "---\nname: lint\ndescription: Lint\n---\nRun lints.\n");
        write(
            "helper/SKILL.md",
            "---\nname: helper\nmetadata:\n  internal: true\n---\nInternal.\n",
        );
        write("nested/deep/SKILL.md", "---\nname: deep\n---\nToo deep.\n");
        write("README.md", "# skills\n");
        tmp
    }
}

#[async_trait]
impl RepoFetcher for FixtureFetcher {
    async fn fetch(&self, source: &ParsedSource, commit: Option<&str>) -> Result<FetchedTree> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(raw) = &self.failure {
            return Err(CloneError::from_output(
                format!("git clone --quiet {} <dest>", source.clone_url),
                &source.clone_url,
                raw.as_str(),
            )
            .into());
        }
        if let Some(path) = &source.local_path {
            return Ok(FetchedTree::borrowed(path.clone(), ""));
        }
        let commit = match commit {
            Some(c) => c.to_string(),
            None => self.commit.lock().unwrap().clone(),
        };
        Ok(FetchedTree::borrowed(self.root.clone(), commit))
    }
}
