use std::path::{Path, PathBuf};

use {
    duckrow_agents::{Agents, McpServerSpec, RemoteTransport, System},
    duckrow_common::Warned,
    duckrow_lock::{LockStore, McpLockEntry},
    duckrow_registry::{McpEntry, McpType},
    serde::Serialize,
    tracing::{debug, info, warn},
};

use crate::{
    env::required_env,
    error::{Error, Result},
    hash::config_hash,
};

/// What an agent should be given for a registry MCP entry.
pub fn server_spec(entry: &McpEntry) -> Result<McpServerSpec> {
    match (&entry.command, &entry.url) {
        (Some(command), None) => Ok(McpServerSpec::Stdio {
            command: command.clone(),
            args: entry.args.clone(),
            env: entry.env_map(),
        }),
        (None, Some(url)) => Ok(McpServerSpec::Remote {
            url: url.clone(),
            transport: match entry.effective_type() {
                McpType::Sse => RemoteTransport::Sse,
                McpType::Http | McpType::Stdio => RemoteTransport::Http,
            },
        }),
        _ => Err(Error::message(format!(
            "MCP '{}' needs exactly one of command or url",
            entry.name
        ))),
    }
}

/// Result of writing one MCP entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McpInstall {
    pub name: String,
    pub config_hash: String,
    /// Agents whose config now contains the entry.
    pub agents: Vec<String>,
    pub config_paths: Vec<PathBuf>,
    pub required_env: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftState {
    InSync,
    Modified,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftStatus {
    pub agent: String,
    pub state: DriftState,
}

/// Writes and removes MCP stanzas through each agent's config format.
#[derive(Debug, Clone, Copy)]
pub struct McpWriter {
    agents: &'static Agents,
}

impl Default for McpWriter {
    fn default() -> Self {
        Self {
            agents: Agents::builtin(),
        }
    }
}

impl McpWriter {
    pub fn new(agents: &'static Agents) -> Self {
        Self { agents }
    }

    /// Agent ids that can hold MCP config.
    pub fn capable_agents(&self) -> Vec<String> {
        self.agents
            .all()
            .filter(|s| s.mcp_config_path().is_some() && s.mcp_format().is_some())
            .map(|s| s.id().to_string())
            .collect()
    }

    /// Write `entry` into every target agent's config, then record it in
    /// `lock` when given. Agents without MCP support are skipped with a
    /// warning.
    pub fn install<S: AsRef<str>>(
        &self,
        entry: &McpEntry,
        registry: &str,
        target_dir: &Path,
        target_agents: &[S],
        lock: Option<&LockStore>,
    ) -> Result<Warned<McpInstall>> {
        let systems = self.agents.resolve(target_agents)?;
        let spec = server_spec(entry)?;
        let mut out = Warned::new(McpInstall {
            name: entry.name.clone(),
            config_hash: config_hash(&spec),
            agents: Vec::new(),
            config_paths: Vec::new(),
            required_env: required_env(entry),
        });

        for system in systems {
            let Some((path, format)) = mcp_target(system, target_dir) else {
                debug!(agent = system.id(), "agent has no MCP config");
                out.warn(format!("{} does not support MCP servers", system.display_name()));
                continue;
            };
            format.upsert(&path, &entry.name, &spec)?;
            out.value.agents.push(system.id().to_string());
            out.value.config_paths.push(path);
        }

        if let Some(lock) = lock {
            lock.add_or_update_mcp(McpLockEntry {
                name: entry.name.clone(),
                registry: registry.to_string(),
                config_hash: out.value.config_hash.clone(),
                agents: out.value.agents.clone(),
                required_env: out.value.required_env.clone(),
            })?;
        }
        info!(
            mcp = %entry.name,
            %registry,
            agents = ?out.value.agents,
            hash = %out.value.config_hash,
            "installed MCP server"
        );
        Ok(out)
    }

    /// Remove `name` from each agent's config. Agents with no such stanza,
    /// or no MCP support, are skipped. Returns the agents that changed.
    pub fn uninstall<S: AsRef<str>>(
        &self,
        name: &str,
        target_dir: &Path,
        agents: &[S],
        lock: Option<&LockStore>,
    ) -> Result<Warned<Vec<String>>> {
        let mut out = Warned::new(Vec::new());
        for id in agents {
            let Some(system) = self.agents.get(id.as_ref()) else {
                out.warn(format!("unknown agent '{}'", id.as_ref()));
                continue;
            };
            let Some((path, format)) = mcp_target(system, target_dir) else {
                continue;
            };
            match format.remove(&path, name) {
                Ok(true) => out.value.push(system.id().to_string()),
                Ok(false) => {},
                Err(e) => {
                    warn!(agent = system.id(), mcp = %name, error = %e, "failed to remove MCP entry");
                    out.warn(format!("{}: {e}", system.display_name()));
                },
            }
        }
        if let Some(lock) = lock {
            lock.remove_entry(duckrow_lock::AssetKind::Mcp, name)?;
        }
        info!(mcp = %name, removed_from = ?out.value, "uninstalled MCP server");
        Ok(out)
    }

    /// Compare each recorded agent's config with the hash in the lock entry.
    pub fn check_drift(&self, target_dir: &Path, entry: &McpLockEntry) -> Vec<DriftStatus> {
        entry
            .agents
            .iter()
            .map(|id| {
                let state = self
                    .agents
                    .get(id)
                    .and_then(|system| mcp_target(system, target_dir))
                    .and_then(|(path, format)| format.read(&path, &entry.name).ok().flatten())
                    .map_or(DriftState::Missing, |spec| {
                        if hash_matches(spec, &entry.config_hash) {
                            DriftState::InSync
                        } else {
                            DriftState::Modified
                        }
                    });
                DriftStatus {
                    agent: id.clone(),
                    state,
                }
            })
            .collect()
    }
}

fn hash_matches(spec: McpServerSpec, hash: &str) -> bool {
    if config_hash(&spec) == hash {
        return true;
    }
    // Some formats do not store the transport and read back as http.
    match spec {
        McpServerSpec::Remote {
            url,
            transport: RemoteTransport::Http,
        } => {
            config_hash(&McpServerSpec::Remote {
                url,
                transport: RemoteTransport::Sse,
            }) == hash
        },
        _ => false,
    }
}

fn mcp_target(
    system: &dyn System,
    target_dir: &Path,
) -> Option<(PathBuf, duckrow_agents::McpFormat)> {
    Some((system.resolve_mcp_config_path(target_dir)?, system.mcp_format()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn db() -> McpEntry {
        McpEntry {
            name: "db".into(),
            description: String::new(),
            command: Some("npx".into()),
            args: vec!["-y".into(), "db-mcp".into()],
            env: vec!["API_KEY=$API_KEY".into()],
            url: None,
            kind: None,
        }
    }

    fn docs() -> McpEntry {
        McpEntry {
            name: "docs".into(),
            description: String::new(),
            command: None,
            args: vec![],
            env: vec![],
            url: Some("https://docs.example.com/mcp".into()),
            kind: Some(McpType::Sse),
        }
    }

    #[test]
    fn spec_for_each_shape() {
        assert!(matches!(server_spec(&db()).unwrap(), McpServerSpec::Stdio { ref command, .. } if command == "npx"));
        assert!(matches!(
            server_spec(&docs()).unwrap(),
            McpServerSpec::Remote { transport: RemoteTransport::Sse, .. }
        ));
        let mut both = db();
        both.url = Some("https://x".into());
        assert!(server_spec(&both).is_err());
    }

    #[test]
    fn install_writes_configs_and_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = LockStore::for_project(tmp.path());
        let out = McpWriter::default()
            .install(&db(), "team", tmp.path(), &["claude-code", "codex", "universal"], Some(&lock))
            .unwrap();

        assert_eq!(out.value.agents, vec!["claude-code", "codex"]);
        assert_eq!(out.value.required_env, vec!["API_KEY"]);
        assert_eq!(out.warnings.len(), 1);
        assert!(tmp.path().join(".mcp.json").is_file());
        assert!(tmp.path().join(".codex/config.toml").is_file());

        let entry = lock.read().unwrap().find_mcp("db").cloned().unwrap();
        assert_eq!(entry.registry, "team");
        assert_eq!(entry.config_hash, out.value.config_hash);
        assert_eq!(entry.required_env, vec!["API_KEY"]);
    }

    #[test]
    fn reinstall_keeps_single_stanza() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = McpWriter::default();
        writer.install(&db(), "team", tmp.path(), &["cursor"], None).unwrap();
        writer.install(&db(), "team", tmp.path(), &["cursor"], None).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join(".cursor/mcp.json")).unwrap())
                .unwrap();
        assert_eq!(raw["mcpServers"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn uninstall_tolerates_missing_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = LockStore::for_project(tmp.path());
        let writer = McpWriter::default();
        writer
            .install(&docs(), "team", tmp.path(), &["copilot"], Some(&lock))
            .unwrap();

        let out = writer
            .uninstall("docs", tmp.path(), &["copilot", "opencode", "universal"], Some(&lock))
            .unwrap();
        assert_eq!(out.value, vec!["copilot"]);
        assert!(!out.has_warnings());
        assert!(lock.read().unwrap().find_mcp("docs").is_none());
    }

    #[test]
    fn drift_detects_hand_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = LockStore::for_project(tmp.path());
        let writer = McpWriter::default();
        writer
            .install(&db(), "team", tmp.path(), &["claude-code", "cursor", "opencode"], Some(&lock))
            .unwrap();
        let entry = lock.read().unwrap().find_mcp("db").cloned().unwrap();

        let mut edited = db();
        edited.args.push("--verbose".into());
        let spec = server_spec(&edited).unwrap();
        duckrow_agents::McpFormat::McpServers
            .upsert(&tmp.path().join(".cursor/mcp.json"), "db", &spec)
            .unwrap();
        duckrow_agents::McpFormat::OpenCode
            .remove(&tmp.path().join("opencode.json"), "db")
            .unwrap();

        let states: Vec<_> = writer
            .check_drift(tmp.path(), &entry)
            .into_iter()
            .map(|d| d.state)
            .collect();
        assert_eq!(states, vec![DriftState::InSync, DriftState::Modified, DriftState::Missing]);
    }

    #[test]
    fn remote_entry_in_sync_across_formats() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = LockStore::for_project(tmp.path());
        let agents = ["claude-code", "codex", "copilot", "opencode"];
        McpWriter::default()
            .install(&docs(), "team", tmp.path(), &agents, Some(&lock))
            .unwrap();
        let entry = lock.read().unwrap().find_mcp("docs").cloned().unwrap();
        assert!(
            McpWriter::default()
                .check_drift(tmp.path(), &entry)
                .iter()
                .all(|d| d.state == DriftState::InSync)
        );
    }

    #[test]
    fn capable_agents_exclude_universal() {
        let ids = McpWriter::default().capable_agents();
        assert!(!ids.contains(&"universal".to_string()));
        assert!(ids.contains(&"codex".to_string()));
    }
}
