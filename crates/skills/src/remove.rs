use std::path::Path;

use {
    duckrow_agents::{Agents, CANONICAL_SKILLS_DIR},
    duckrow_common::Warned,
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    install::remove_path,
    parse,
};

/// What a removal actually touched.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub canonical_removed: bool,
    /// Agent ids whose link was removed.
    pub unlinked: Vec<String>,
}

impl Removal {
    pub fn removed_anything(&self) -> bool {
        self.canonical_removed || !self.unlinked.is_empty()
    }
}

/// Deletes installed skills from a project.
///
/// The lock file is not touched; callers remove the entry themselves.
#[derive(Debug, Clone, Copy)]
pub struct Remover {
    agents: &'static Agents,
}

impl Default for Remover {
    fn default() -> Self {
        Self {
            agents: Agents::builtin(),
        }
    }
}

impl Remover {
    pub fn new(agents: &'static Agents) -> Self {
        Self { agents }
    }

    /// Remove `<target>/.agents/skills/<name>` and every agent link to it.
    ///
    /// Link removal is best-effort: failures become warnings. Failing to
    /// delete the canonical copy is an error.
    pub fn remove(&self, name: &str, target_dir: &Path) -> Result<Warned<Removal>> {
        if !parse::validate_name(name) {
            return Err(Error::message(format!("invalid skill name '{name}'")));
        }

        let mut out = Warned::new(Removal::default());
        for system in self.agents.linked_skill_systems() {
            match system.uninstall_skill(target_dir, name) {
                Ok(true) => out.value.unlinked.push(system.id().to_string()),
                Ok(false) => {},
                Err(e) => {
                    warn!(agent = system.id(), skill = %name, error = %e, "failed to remove agent link");
                    out.warn(format!("{}: {e}", system.display_name()));
                },
            }
        }

        let canonical = target_dir.join(CANONICAL_SKILLS_DIR).join(name);
        if std::fs::symlink_metadata(&canonical).is_ok() {
            remove_path(&canonical)?;
            out.value.canonical_removed = true;
        } else {
            debug!(path = %canonical.display(), "canonical copy already absent");
        }

        info!(
            skill = %name,
            canonical = out.value.canonical_removed,
            unlinked = ?out.value.unlinked,
            "removed skill"
        );
        Ok(out)
    }
}
