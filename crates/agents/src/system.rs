use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::{error::Result, mcp_format::McpFormat};

/// Where every installed skill physically lives, relative to the project root.
pub const CANONICAL_SKILLS_DIR: &str = ".agents/skills";

/// What linking a skill into an agent's directory did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The agent reads the canonical directory directly.
    Canonical,
    /// A symlink was created (or replaced) at this path.
    Linked(PathBuf),
    /// The agent has no skills directory.
    Unsupported,
}

/// Capability contract for a coding agent's on-disk conventions.
///
/// Callers check capability presence (`skills_dir`, `mcp_config_path`), never
/// agent identity.
pub trait System: Send + Sync {
    /// Stable identifier used on the command line and in lock files.
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Skills directory relative to the project root.
    fn skills_dir(&self) -> Option<&str>;

    /// MCP config file relative to the project root.
    fn mcp_config_path(&self) -> Option<&str>;

    fn mcp_format(&self) -> Option<McpFormat>;

    /// Directory or file whose presence means the project uses this agent.
    fn marker(&self) -> Option<&str> {
        None
    }

    fn uses_canonical_skills_dir(&self) -> bool {
        self.skills_dir()
            .is_some_and(|d| d.trim_end_matches('/') == CANONICAL_SKILLS_DIR)
    }

    fn resolve_skills_dir(&self, project: &Path) -> Option<PathBuf> {
        self.skills_dir().map(|d| project.join(d))
    }

    fn resolve_mcp_config_path(&self, project: &Path) -> Option<PathBuf> {
        self.mcp_config_path().map(|p| project.join(p))
    }

    fn is_present(&self, project: &Path) -> bool {
        self.marker().is_some_and(|m| project.join(m).exists())
    }

    /// Expose `<project>/.agents/skills/<name>` in this agent's directory.
    ///
    /// An existing entry at the link path is replaced.
    fn install_skill(&self, project: &Path, name: &str) -> Result<LinkOutcome> {
        let Some(dir) = self.skills_dir() else {
            return Ok(LinkOutcome::Unsupported);
        };
        if self.uses_canonical_skills_dir() {
            return Ok(LinkOutcome::Canonical);
        }

        let link_dir = project.join(dir);
        std::fs::create_dir_all(&link_dir)?;
        let link = link_dir.join(name);
        remove_existing(&link)?;

        let target = relative_canonical_target(dir, name);
        symlink_dir(&target, &link)?;
        debug!(agent = self.id(), link = %link.display(), target = %target.display(), "linked skill");
        Ok(LinkOutcome::Linked(link))
    }

    /// Remove this agent's link to a skill. Returns `true` if a link was removed.
    ///
    /// Real directories at the link path are left alone.
    fn uninstall_skill(&self, project: &Path, name: &str) -> Result<bool> {
        let Some(dir) = self.skills_dir() else {
            return Ok(false);
        };
        if self.uses_canonical_skills_dir() {
            return Ok(false);
        }
        let link = project.join(dir).join(name);
        match std::fs::symlink_metadata(&link) {
            Ok(meta) if meta.file_type().is_symlink() => {
                remove_symlink(&link)?;
                Ok(true)
            },
            Ok(_) => {
                warn!(agent = self.id(), path = %link.display(), "not a symlink, leaving in place");
                Ok(false)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// `../../.agents/skills/<name>` as seen from `<project>/<skills_dir>/`.
fn relative_canonical_target(skills_dir: &str, name: &str) -> PathBuf {
    let depth = Path::new(skills_dir)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    target.join(CANONICAL_SKILLS_DIR).join(name)
}

fn remove_existing(path: &Path) -> std::io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => remove_symlink(path),
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)
}

#[cfg(windows)]
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    // Directory symlinks on Windows are removed with remove_dir.
    std::fs::remove_dir(path).or_else(|_| std::fs::remove_file(path))
}
