use std::{fmt, path::Path, sync::LazyLock};

use crate::{
    error::{Error, Result},
    mcp_format::McpFormat,
    system::{CANONICAL_SKILLS_DIR, System},
};

/// A table-driven agent convention.
#[derive(Debug, Clone)]
pub struct BuiltinSystem {
    pub id: &'static str,
    pub display_name: &'static str,
    pub skills_dir: Option<&'static str>,
    pub mcp_config_path: Option<&'static str>,
    pub mcp_format: Option<McpFormat>,
    pub marker: Option<&'static str>,
}

impl System for BuiltinSystem {
    fn id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        self.display_name
    }

    fn skills_dir(&self) -> Option<&str> {
        self.skills_dir
    }

    fn mcp_config_path(&self) -> Option<&str> {
        self.mcp_config_path
    }

    fn mcp_format(&self) -> Option<McpFormat> {
        self.mcp_format
    }

    fn marker(&self) -> Option<&str> {
        self.marker
    }
}

const BUILTIN: &[BuiltinSystem] = &[
    BuiltinSystem {
        id: "universal",
        display_name: "Universal",
        skills_dir: Some(CANONICAL_SKILLS_DIR),
        mcp_config_path: None,
        mcp_format: None,
        marker: Some(".agents"),
    },
    BuiltinSystem {
        id: "codex",
        display_name: "Codex",
        skills_dir: Some(CANONICAL_SKILLS_DIR),
        mcp_config_path: Some(".codex/config.toml"),
        mcp_format: Some(McpFormat::CodexToml),
        marker: Some(".codex"),
    },
    BuiltinSystem {
        id: "claude-code",
        display_name: "Claude Code",
        skills_dir: Some(".claude/skills"),
        mcp_config_path: Some(".mcp.json"),
        mcp_format: Some(McpFormat::McpServers),
        marker: Some(".claude"),
    },
    BuiltinSystem {
        id: "cursor",
        display_name: "Cursor",
        skills_dir: Some(".cursor/skills"),
        mcp_config_path: Some(".cursor/mcp.json"),
        mcp_format: Some(McpFormat::McpServers),
        marker: Some(".cursor"),
    },
    BuiltinSystem {
        id: "copilot",
        display_name: "GitHub Copilot",
        skills_dir: Some(".github/skills"),
        mcp_config_path: Some(".vscode/mcp.json"),
        mcp_format: Some(McpFormat::VsCodeServers),
        marker: Some(".github/copilot-instructions.md"),
    },
    BuiltinSystem {
        id: "opencode",
        display_name: "OpenCode",
        skills_dir: Some(".opencode/skills"),
        mcp_config_path: Some("opencode.json"),
        mcp_format: Some(McpFormat::OpenCode),
        marker: Some("opencode.json"),
    },
];

static BUILTIN_AGENTS: LazyLock<Agents> = LazyLock::new(|| {
    Agents::new(
        BUILTIN
            .iter()
            .cloned()
            .map(|s| Box::new(s) as Box<dyn System>)
            .collect(),
    )
});

/// The set of agent conventions known to this process.
pub struct Agents {
    systems: Vec<Box<dyn System>>,
}

impl fmt::Debug for Agents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

impl Agents {
    pub fn new(systems: Vec<Box<dyn System>>) -> Self {
        Self { systems }
    }

    pub fn builtin() -> &'static Agents {
        &BUILTIN_AGENTS
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.iter().map(|s| &**s as &dyn System)
    }

    pub fn get(&self, id: &str) -> Option<&dyn System> {
        self.all().find(|s| s.id() == id)
    }

    /// Resolve agent ids, failing on the first unknown one.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<&dyn System>> {
        ids.iter()
            .map(|id| {
                self.get(id.as_ref())
                    .ok_or_else(|| Error::UnknownAgent(id.as_ref().to_string()))
            })
            .collect()
    }

    /// Agents whose marker exists in the project.
    pub fn detect(&self, project: &Path) -> Vec<&dyn System> {
        self.all().filter(|s| s.is_present(project)).collect()
    }

    /// Agents that read skills from their own directory (and need a symlink).
    pub fn linked_skill_systems(&self) -> impl Iterator<Item = &dyn System> {
        self.all()
            .filter(|s| s.skills_dir().is_some() && !s.uses_canonical_skills_dir())
    }

    pub fn ids(&self) -> Vec<&str> {
        self.all().map(System::id).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let ids = Agents::builtin().ids();
        let mut dedup = ids.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(ids.len(), dedup.len());
    }

    #[test]
    fn resolve_rejects_unknown() {
        let agents = Agents::builtin();
        assert_eq!(agents.resolve(&["cursor", "codex"]).unwrap().len(), 2);
        let err = agents.resolve(&["cursor", "vim"]).err().unwrap();
        assert!(matches!(err, Error::UnknownAgent(ref id) if id == "vim"));
    }

    #[test]
    fn detects_by_marker() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".claude")).unwrap();
        std::fs::write(tmp.path().join("opencode.json"), "{}").unwrap();
        let found: Vec<_> = Agents::builtin()
            .detect(tmp.path())
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(found, vec!["claude-code", "opencode"]);
    }

    #[test]
    fn canonical_agents_are_not_linked() {
        let linked: Vec<_> = Agents::builtin()
            .linked_skill_systems()
            .map(System::id)
            .collect();
        assert!(!linked.contains(&"codex"));
        assert!(!linked.contains(&"universal"));
        assert!(linked.contains(&"claude-code"));
    }

    #[test]
    fn resolves_config_paths() {
        let codex = Agents::builtin().get("codex").unwrap();
        assert_eq!(
            codex.resolve_mcp_config_path(Path::new("/p")).unwrap(),
            Path::new("/p/.codex/config.toml")
        );
        assert!(Agents::builtin().get("universal").unwrap().mcp_config_path().is_none());
    }

    #[test]
    fn debug_lists_ids() {
        let shown = format!("{:?}", Agents::builtin());
        assert!(shown.starts_with("[\"universal\", \"codex\""));
    }
}
