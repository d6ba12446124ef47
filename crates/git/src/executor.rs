use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    tokio::process::Command,
    tracing::{debug, warn},
};

use crate::error::{CloneError, CloneErrorKind};

// NOTE: git is driven as a subprocess so that the user's own credential
// helpers, SSH agent and proxy settings apply unchanged.

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One clone attempt. Editing `url` and calling [`GitExecutor::clone_repo`]
/// again is the whole retry protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub url: String,
    pub dest: PathBuf,
    /// Branch or tag to check out.
    pub git_ref: Option<String>,
    /// Exact commit to check out after cloning.
    pub commit: Option<String>,
    pub shallow: bool,
}

impl CloneRequest {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            git_ref: None,
            commit: None,
            shallow: true,
        }
    }

    #[must_use]
    pub fn with_ref(mut self, git_ref: Option<String>) -> Self {
        self.git_ref = git_ref.filter(|r| !r.is_empty());
        self
    }

    /// Pin a commit. Pinned clones are never shallow so the commit is reachable.
    #[must_use]
    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit.filter(|c| !c.is_empty());
        if self.commit.is_some() {
            self.shallow = false;
        }
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Stateless git runner with a hard per-invocation timeout.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl GitExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Clone `req.url` into `req.dest`, then check out `req.commit` if set.
    pub async fn clone_repo(&self, req: &CloneRequest) -> Result<(), CloneError> {
        let mut args: Vec<String> = vec!["clone".into(), "--quiet".into()];
        if req.shallow {
            args.extend(["--depth".into(), "1".into()]);
        }
        if let Some(ref git_ref) = req.git_ref {
            args.extend(["--branch".into(), git_ref.clone()]);
        }
        args.push(req.url.clone());
        args.push(req.dest.to_string_lossy().into_owned());

        self.run(&args, None, &req.url).await?;

        if let Some(ref commit) = req.commit {
            self.checkout(&req.dest, commit, &req.url).await?;
        }
        debug!(url = %req.url, dest = %req.dest.display(), "cloned repository");
        Ok(())
    }

    /// Check out an exact commit in an existing working tree.
    pub async fn checkout(&self, dir: &Path, commit: &str, url: &str) -> Result<(), CloneError> {
        let args = ["checkout".to_string(), "--quiet".into(), commit.to_string()];
        self.run(&args, Some(dir), url).await.map(drop)
    }

    /// Fast-forward an existing clone in place.
    pub async fn pull(&self, dir: &Path, url: &str) -> Result<(), CloneError> {
        let args = ["pull".to_string(), "--ff-only".into(), "--quiet".into()];
        self.run(&args, Some(dir), url).await.map(drop)
    }

    /// Commit hash at HEAD of a working tree.
    pub async fn resolve_head(&self, dir: &Path) -> Result<String, CloneError> {
        let args = ["rev-parse".to_string(), "HEAD".into()];
        let url = dir.to_string_lossy();
        let out = self.run(&args, Some(dir), &url).await?;
        Ok(out.trim().to_string())
    }

    /// Remote commit lookup without cloning.
    ///
    /// `None` asks for `HEAD`. A named ref resolves as a branch first, then
    /// as a tag, peeling annotated tags to the commit they point at. Refnames
    /// match exactly, so `main` never picks up `refs/heads/feature/main`.
    /// Returns `Ok(None)` when the remote answered but has no such ref.
    pub async fn ls_remote(
        &self,
        url: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, CloneError> {
        let wanted = wanted_refs(git_ref);
        if let [only] = wanted.as_slice()
            && is_full_sha(only)
        {
            return Ok(Some(only.clone()));
        }
        let mut args = vec!["ls-remote".to_string(), url.to_string()];
        args.extend(wanted.iter().cloned());
        let out = self.run(&args, None, url).await?;
        Ok(parse_ls_remote(&out, &wanted))
    }

    async fn run(&self, args: &[String], cwd: Option<&Path>, url: &str) -> Result<String, CloneError> {
        let command = render_command(&self.program, args);
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!(%command, "running git");
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CloneError::spawn_failed(command, url, &e)),
            Err(_) => {
                warn!(%command, timeout_secs = self.timeout.as_secs(), "git timed out");
                return Err(CloneError::with_kind(
                    CloneErrorKind::Timeout,
                    command,
                    url,
                    format!("deadline exceeded after {}s", self.timeout.as_secs()),
                ));
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let raw_output = format!("{stdout}{stderr}");
        let err = CloneError::from_output(command, url, raw_output);
        warn!(kind = ?err.kind, command = %err.command, "git failed");
        Err(err)
    }
}

fn render_command(program: &Path, args: &[String]) -> String {
    std::iter::once(program.to_string_lossy().into_owned())
        .chain(args.iter().map(|a| {
            if a.contains(' ') {
                format!("'{a}'")
            } else {
                a.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Refnames to ask `ls-remote` for, in order of preference.
fn wanted_refs(git_ref: Option<&str>) -> Vec<String> {
    match git_ref.map(str::trim).filter(|r| !r.is_empty()) {
        None => vec!["HEAD".into()],
        Some(r) if is_full_sha(r) => vec![r.to_string()],
        Some(r) if r.starts_with("refs/") => vec![r.to_string(), format!("{r}^{{}}")],
        Some(r) => vec![
            format!("refs/heads/{r}"),
            format!("refs/tags/{r}^{{}}"),
            format!("refs/tags/{r}"),
        ],
    }
}

fn is_full_sha(s: &str) -> bool {
    s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// First commit in `output` whose refname is exactly one of `wanted`,
/// honoring the order of `wanted`.
fn parse_ls_remote(output: &str, wanted: &[String]) -> Option<String> {
    let lines: Vec<(&str, &str)> = output
        .lines()
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .filter(|(sha, _)| is_full_sha(sha))
        .collect();
    wanted.iter().find_map(|name| {
        lines
            .iter()
            .find(|(_, refname)| *refname == name.as_str())
            .map(|(sha, _)| (*sha).to_string())
    })
}
