use std::path::{Path, PathBuf};

use {sha2::{Digest, Sha256}, tracing::debug};

use crate::{
    error::{Context, Error, Result},
    schema::DuckrowConfig,
};

pub const CONFIG_FILE_NAME: &str = "config.json";
const REGISTRIES_DIR: &str = "registries";

/// Returns the default config directory (`~/.duckrow/`).
pub fn default_config_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".duckrow"))
        .ok_or(Error::NoHomeDir)
}

/// Handle on the user config directory.
///
/// Owns the path to `config.json` and the per-registry clone cache.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `~/.duckrow/`.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_config_dir()?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Root of all registry clones.
    pub fn registries_dir(&self) -> PathBuf {
        self.dir.join(REGISTRIES_DIR)
    }

    /// Load config from disk, returning defaults if the file is missing.
    pub fn load(&self) -> Result<DuckrowConfig> {
        let path = self.config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file found, using defaults");
            return Ok(DuckrowConfig::default());
        }
        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&data).map_err(|source| Error::Parse { path, source })
    }

    /// Save config atomically via temp file + rename.
    pub fn save(&self, config: &DuckrowConfig) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.config_path();
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Load, mutate, and save in one step.
    pub fn update<T>(&self, f: impl FnOnce(&mut DuckrowConfig) -> Result<T>) -> Result<T> {
        let mut config = self.load()?;
        let out = f(&mut config)?;
        self.save(&config)?;
        Ok(out)
    }
}

/// `host/path` of a repo URL: scheme, user, `.git` and case dropped, scp
/// `host:path` turned into `host/path`.
fn normalize_repo_url(repo_url: &str) -> String {
    let s = repo_url.trim().trim_end_matches('/');
    let (s, scp) = match s.split_once("://") {
        Some((_, rest)) => (rest, false),
        None => (s, true),
    };
    let s = s.split_once('@').map_or(s, |(_, rest)| rest);
    let s = s.trim_end_matches(".git").trim_end_matches('/');
    let s = if scp { s.replacen(':', "/", 1) } else { s.to_string() };
    s.to_lowercase()
}

/// Turn a repo URL into a readable, filesystem-safe name.
///
/// `https://github.com/acme/registry.git` and `git@github.com:acme/registry.git`
/// both become `github.com-acme-registry`. Different URLs can share a name;
/// use [`repo_cache_key`] where uniqueness matters.
pub fn sanitize_repo_url(repo_url: &str) -> String {
    let normalized = normalize_repo_url(repo_url);
    let mut out = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Clone directory name for a repo URL: the readable name plus a digest of
/// the normalized URL, so distinct repos never share a directory.
pub fn repo_cache_key(repo_url: &str) -> String {
    let digest = Sha256::digest(normalize_repo_url(repo_url).as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
    format!("{}-{hex}", sanitize_repo_url(repo_url))
}
