//! Turning source strings into concrete git locations.
//!
//! Recognized shapes:
//!
//! - `owner/repo` and `owner/repo@asset` (GitHub shorthand)
//! - `https://host/owner/repo(.git)`, including GitHub `/tree/<ref>/<path>` links
//! - `ssh://user@host/owner/repo.git` and `user@host:owner/repo.git`
//! - `host/owner/repo[/sub/path]` (registry manifest form)
//! - `/abs`, `./rel`, `../rel`, `~/path`, or any existing directory (local)
//!
//! Any git shape may carry a `#ref` suffix.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use {serde::Serialize, tracing::debug};

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "github.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Git,
    Local,
}

/// A resolved source. Only `clone_url` changes after construction (overrides).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSource {
    pub source_type: SourceType,
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub clone_url: String,
    pub sub_path: Option<String>,
    pub asset_name: Option<String>,
    pub git_ref: Option<String>,
    /// Directory on disk for local sources.
    pub local_path: Option<PathBuf>,
}

impl ParsedSource {
    fn git(host: &str, owner: &str, repo: &str, clone_url: String) -> Self {
        Self {
            source_type: SourceType::Git,
            host: host.to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            clone_url,
            sub_path: None,
            asset_name: None,
            git_ref: None,
            local_path: None,
        }
    }

    fn local(path: PathBuf) -> Self {
        Self {
            source_type: SourceType::Local,
            host: String::new(),
            owner: String::new(),
            repo: String::new(),
            clone_url: String::new(),
            sub_path: None,
            asset_name: None,
            git_ref: None,
            local_path: Some(path),
        }
    }

    pub fn is_local(&self) -> bool {
        self.source_type == SourceType::Local
    }

    /// `owner/repo`, the key clone-URL overrides are looked up by.
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Lowercased `host/owner/repo` used to compare sources written differently.
    pub fn repo_identity(&self) -> String {
        match &self.local_path {
            Some(path) => path.display().to_string(),
            None => format!("{}/{}/{}", self.host, self.owner, self.repo).to_ascii_lowercase(),
        }
    }

    /// [`Self::repo_identity`] plus the sub-path, if any.
    pub fn normalized_key(&self) -> String {
        let mut key = self.repo_identity();
        if let Some(sub) = &self.sub_path {
            key.push('/');
            key.push_str(&sub.to_ascii_lowercase());
        }
        key
    }

    /// Name a single-asset checkout should be installed under.
    pub fn default_asset_name(&self) -> String {
        if let Some(last) = self.sub_path.as_deref().and_then(|s| s.rsplit('/').next()) {
            return last.to_string();
        }
        if let Some(path) = &self.local_path {
            return path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        self.repo.clone()
    }

    /// Replace `clone_url` if the repo key is overridden (case-insensitive).
    ///
    /// Returns `true` if an override applied.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> bool {
        if self.is_local() {
            return false;
        }
        let key = self.repo_key();
        let Some((_, url)) = overrides
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(&key))
        else {
            return false;
        };
        debug!(repo = %key, from = %self.clone_url, to = %url, "applying clone URL override");
        self.clone_url = url.clone();
        true
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        self.apply_overrides(overrides);
        self
    }
}

impl fmt::Display for ParsedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.local_path {
            return write!(f, "{}", path.display());
        }
        write!(f, "{}/{}/{}", self.host, self.owner, self.repo)?;
        if let Some(sub) = &self.sub_path {
            write!(f, "/{sub}")?;
        }
        if let Some(asset) = &self.asset_name {
            write!(f, "@{asset}")?;
        }
        if let Some(r) = &self.git_ref {
            write!(f, "#{r}")?;
        }
        Ok(())
    }
}

/// Parse a user-supplied source string.
pub fn parse_source(input: &str) -> Result<ParsedSource> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_source(input, "empty source"));
    }

    if let Some(path) = explicit_local_path(trimmed) {
        return local_source(input, path);
    }

    let (body, git_ref) = split_ref(trimmed);
    let mut parsed = if body.contains("://") {
        parse_url(input, body)?
    } else if let Some(parsed) = parse_scp(input, body)? {
        parsed
    } else if looks_like_registry_form(body) {
        parse_registry_form(input, body)?
    } else if let Some(parsed) = parse_shorthand(input, body)? {
        parsed
    } else if Path::new(trimmed).is_dir() {
        return local_source(input, PathBuf::from(trimmed));
    } else {
        return Err(Error::invalid_source(
            input,
            "expected owner/repo[@skill], a git URL, or an existing directory",
        ));
    };

    if git_ref.is_some() {
        parsed.git_ref = git_ref;
    }
    Ok(parsed)
}

/// Parse a registry manifest `source`, using `version` as the ref unless the
/// source carries its own `#ref`.
pub fn parse_registry_source(source: &str, version: Option<&str>) -> Result<ParsedSource> {
    let mut parsed = parse_source(source)?;
    if parsed.git_ref.is_none() {
        parsed.git_ref = version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
    }
    Ok(parsed)
}

/// Lowercased comparison key for a source string, if it parses.
pub fn normalize_source(source: &str) -> Option<String> {
    parse_source(source).ok().map(|p| p.normalized_key())
}

fn split_ref(input: &str) -> (&str, Option<String>) {
    match input.rsplit_once('#') {
        Some((body, r)) if !body.is_empty() && !r.trim().is_empty() => {
            (body, Some(r.trim().to_string()))
        },
        Some((body, _)) => (body, None),
        None => (input, None),
    }
}

fn explicit_local_path(input: &str) -> Option<PathBuf> {
    if input == "." || input == ".." || input.starts_with("./") || input.starts_with("../") {
        return Some(PathBuf::from(input));
    }
    if input == "~" || input.starts_with("~/") {
        let home = directories::BaseDirs::new()?.home_dir().to_path_buf();
        let rest = input.trim_start_matches('~').trim_start_matches('/');
        return Some(if rest.is_empty() { home } else { home.join(rest) });
    }
    if Path::new(input).is_absolute() {
        return Some(PathBuf::from(input));
    }
    None
}

fn local_source(input: &str, path: PathBuf) -> Result<ParsedSource> {
    if !path.is_dir() {
        return Err(Error::invalid_source(input, "local path is not a directory"));
    }
    let path = std::fs::canonicalize(&path).unwrap_or(path);
    Ok(ParsedSource::local(path))
}

fn strip_git_suffix(repo: &str) -> &str {
    repo.strip_suffix(".git").unwrap_or(repo)
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn join_sub_path(input: &str, segments: &[&str]) -> Result<Option<String>> {
    let segments: Vec<&str> = segments.iter().copied().filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Ok(None);
    }
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::invalid_source(input, "sub-path may not contain '.' or '..'"));
    }
    Ok(Some(segments.join("/")))
}

fn parse_url(input: &str, body: &str) -> Result<ParsedSource> {
    let url = url::Url::parse(body).map_err(|e| Error::invalid_source(input, e.to_string()))?;
    if !matches!(url.scheme(), "https" | "http" | "ssh" | "git" | "file") {
        return Err(Error::invalid_source(
            input,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    // GitHub-style browse links: /owner/repo/tree/<ref>/<sub...>
    if url.scheme().starts_with("http")
        && segments.len() >= 4
        && matches!(segments[2], "tree" | "blob")
    {
        let owner = segments[0];
        let repo = strip_git_suffix(segments[1]);
        let clone_url = format!("{}://{host}/{owner}/{repo}.git", url.scheme());
        let mut parsed = ParsedSource::git(&host, owner, repo, clone_url);
        parsed.git_ref = Some(segments[3].to_string());
        parsed.sub_path = join_sub_path(input, &segments[4..])?;
        return Ok(parsed);
    }

    let (owner, repo) = match segments.as_slice() {
        [.., owner, repo] => (*owner, strip_git_suffix(repo)),
        [repo] if url.scheme() == "file" => ("local", strip_git_suffix(repo)),
        _ => {
            return Err(Error::invalid_source(
                input,
                "URL must name an owner and a repository",
            ));
        },
    };
    if repo.is_empty() {
        return Err(Error::invalid_source(input, "URL has an empty repository name"));
    }
    Ok(ParsedSource::git(&host, owner, repo, body.to_string()))
}

/// `user@host:owner/repo(.git)`.
fn parse_scp(input: &str, body: &str) -> Result<Option<ParsedSource>> {
    let Some((user_host, path)) = body.split_once(':') else {
        return Ok(None);
    };
    let Some((user, host)) = user_host.split_once('@') else {
        return Ok(None);
    };
    if user.is_empty() || host.is_empty() || user.contains('/') {
        return Ok(None);
    }
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let [.., owner, repo] = segments.as_slice() else {
        return Err(Error::invalid_source(input, "SSH source must be host:owner/repo"));
    };
    let repo = strip_git_suffix(repo);
    if !valid_segment(owner) || !valid_segment(repo) {
        return Err(Error::invalid_source(input, "invalid owner or repository name"));
    }
    Ok(Some(ParsedSource::git(
        &host.to_ascii_lowercase(),
        owner,
        repo,
        body.to_string(),
    )))
}

fn looks_like_registry_form(body: &str) -> bool {
    let mut parts = body.split('/');
    let first = parts.next().unwrap_or_default();
    first.contains('.') && !first.starts_with('.') && body.split('/').count() >= 3
}

/// `host/owner/repo[/sub/path]`.
fn parse_registry_form(input: &str, body: &str) -> Result<ParsedSource> {
    let segments: Vec<&str> = body.trim_end_matches('/').split('/').collect();
    let [host, owner, repo, rest @ ..] = segments.as_slice() else {
        return Err(Error::invalid_source(input, "expected host/owner/repo"));
    };
    let repo = strip_git_suffix(repo);
    if !valid_segment(owner) || !valid_segment(repo) {
        return Err(Error::invalid_source(input, "invalid owner or repository name"));
    }
    let host = host.to_ascii_lowercase();
    let clone_url = format!("https://{host}/{owner}/{repo}.git");
    let mut parsed = ParsedSource::git(&host, owner, repo, clone_url);
    parsed.sub_path = join_sub_path(input, rest)?;
    Ok(parsed)
}

/// `owner/repo[@asset]`: exactly one `/` before the optional `@asset`.
fn parse_shorthand(input: &str, body: &str) -> Result<Option<ParsedSource>> {
    let (repo_part, asset) = match body.split_once('@') {
        Some((r, a)) => (r, Some(a)),
        None => (body, None),
    };
    if repo_part.matches('/').count() != 1 {
        return Ok(None);
    }
    let Some((owner, repo)) = repo_part.split_once('/') else {
        return Ok(None);
    };
    let repo = strip_git_suffix(repo);
    if !valid_segment(owner) || !valid_segment(repo) {
        return Err(Error::invalid_source(input, "invalid owner or repository name"));
    }
    let clone_url = format!("https://{DEFAULT_HOST}/{owner}/{repo}.git");
    let mut parsed = ParsedSource::git(DEFAULT_HOST, owner, repo, clone_url);
    if let Some(asset) = asset {
        let asset = asset.trim();
        if asset.is_empty() {
            return Err(Error::invalid_source(input, "empty asset name after '@'"));
        }
        parsed.asset_name = Some(asset.to_string());
    }
    Ok(Some(parsed))
}
