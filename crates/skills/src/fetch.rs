use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    duckrow_git::{CloneRequest, GitExecutor},
    tempfile::TempDir,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    source::ParsedSource,
};

/// A working tree ready for discovery.
///
/// Scratch clones are deleted when this is dropped.
#[derive(Debug)]
pub struct FetchedTree {
    root: PathBuf,
    commit: String,
    _scratch: Option<TempDir>,
}

impl FetchedTree {
    /// A tree that lives somewhere the fetcher does not own.
    pub fn borrowed(root: impl Into<PathBuf>, commit: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            commit: commit.into(),
            _scratch: None,
        }
    }

    /// A tree inside a scratch directory that is removed on drop.
    pub fn scratch(scratch: TempDir, root: PathBuf, commit: impl Into<String>) -> Self {
        Self {
            root,
            commit: commit.into(),
            _scratch: Some(scratch),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checked-out commit. Empty for local sources.
    pub fn commit(&self) -> &str {
        &self.commit
    }
}

/// Produces a working tree for a source.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    /// Obtain a tree for `source`, checked out at `commit` when given.
    async fn fetch(&self, source: &ParsedSource, commit: Option<&str>) -> Result<FetchedTree>;
}

/// Fetcher that clones git sources into a scratch directory.
#[derive(Debug, Clone, Default)]
pub struct GitFetcher {
    git: GitExecutor,
}

impl GitFetcher {
    pub fn new(git: GitExecutor) -> Self {
        Self { git }
    }

    pub fn git(&self) -> &GitExecutor {
        &self.git
    }
}

#[async_trait]
impl RepoFetcher for GitFetcher {
    async fn fetch(&self, source: &ParsedSource, commit: Option<&str>) -> Result<FetchedTree> {
        if let Some(path) = &source.local_path {
            debug!(path = %path.display(), "using local source in place");
            return Ok(FetchedTree::borrowed(path.clone(), ""));
        }

        let scratch = tempfile::Builder::new().prefix("duckrow-").tempdir()?;
        let dest = scratch.path().join("checkout");
        let req = CloneRequest::new(source.clone_url.clone(), dest.clone())
            .with_ref(source.git_ref.clone())
            .with_commit(commit.map(String::from));
        self.git.clone_repo(&req).await?;

        let commit = match commit {
            Some(c) => c.to_string(),
            None => self.git.resolve_head(&dest).await?,
        };
        if commit.is_empty() {
            return Err(Error::message(format!(
                "could not resolve HEAD for {}",
                source.clone_url
            )));
        }
        info!(url = %source.clone_url, %commit, "fetched source");
        Ok(FetchedTree::scratch(scratch, dest, commit))
    }
}
