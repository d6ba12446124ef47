//! `.env.duckrow` override files.
//!
//! One optional file per project root and one global file in the config
//! directory. Values are looked up in the process environment first, then the
//! project file, then the global file.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    loader::ConfigStore,
};

pub const ENV_FILE_NAME: &str = ".env.duckrow";

/// Where a resolved variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvSource {
    Process,
    ProjectFile,
    GlobalFile,
}

impl std::fmt::Display for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Process => "environment",
            Self::ProjectFile => "project .env.duckrow",
            Self::GlobalFile => "global .env.duckrow",
        })
    }
}

/// Parsed project and global override files.
#[derive(Debug, Clone, Default)]
pub struct EnvFiles {
    project: BTreeMap<String, String>,
    global: BTreeMap<String, String>,
}

impl EnvFiles {
    /// Load `<project_dir>/.env.duckrow` and `<config_dir>/.env.duckrow`.
    /// Missing files are treated as empty.
    pub fn load(project_dir: Option<&Path>, config: &ConfigStore) -> Result<Self> {
        let project = match project_dir {
            Some(dir) => read_env_file(&dir.join(ENV_FILE_NAME))?,
            None => BTreeMap::new(),
        };
        let global = read_env_file(&config.dir().join(ENV_FILE_NAME))?;
        Ok(Self { project, global })
    }

    pub fn from_maps(project: BTreeMap<String, String>, global: BTreeMap<String, String>) -> Self {
        Self { project, global }
    }

    /// Look up a variable using the real process environment.
    pub fn lookup(&self, name: &str) -> Option<(String, EnvSource)> {
        self.lookup_with(name, |n| std::env::var(n).ok())
    }

    /// Look up a variable with a custom process-environment lookup.
    ///
    /// Empty values count as unset.
    pub fn lookup_with(
        &self,
        name: &str,
        process: impl Fn(&str) -> Option<String>,
    ) -> Option<(String, EnvSource)> {
        if let Some(v) = process(name).filter(|v| !v.is_empty()) {
            return Some((v, EnvSource::Process));
        }
        if let Some(v) = self.project.get(name).filter(|v| !v.is_empty()) {
            return Some((v.clone(), EnvSource::ProjectFile));
        }
        self.global
            .get(name)
            .filter(|v| !v.is_empty())
            .map(|v| (v.clone(), EnvSource::GlobalFile))
    }
}

fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let to_err = |source| Error::EnvFile {
        path: PathBuf::from(path),
        source,
    };
    let mut vars = BTreeMap::new();
    for item in dotenvy::from_path_iter(path).map_err(to_err)? {
        let (key, value) = item.map_err(to_err)?;
        vars.insert(key, value);
    }
    Ok(vars)
}
