//! Reading and writing MCP server stanzas in each agent's config format.
//!
//! Writers merge into existing files: unrelated keys and other servers are
//! preserved.

use std::{collections::BTreeMap, path::Path};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value, json},
    toml_edit::{DocumentMut, InlineTable, Item},
};

use crate::error::{Error, Result};

/// Remote MCP transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteTransport {
    #[default]
    Http,
    Sse,
}

impl RemoteTransport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Sse => "sse",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "sse" => Self::Sse,
            _ => Self::Http,
        }
    }
}

/// What an agent needs to start or reach an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum McpServerSpec {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Remote {
        url: String,
        #[serde(default)]
        transport: RemoteTransport,
    },
}

/// On-disk MCP config dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum McpFormat {
    /// `{"mcpServers": {name: {...}}}` (Claude Code, Cursor).
    McpServers,
    /// `{"servers": {name: {"type": ...}}}` (VS Code / Copilot).
    VsCodeServers,
    /// `{"mcp": {name: {"type": "local"|"remote"}}}` (OpenCode).
    OpenCode,
    /// `[mcp_servers.<name>]` tables in TOML (Codex).
    CodexToml,
}

impl McpFormat {
    fn root_key(self) -> &'static str {
        match self {
            Self::McpServers => "mcpServers",
            Self::VsCodeServers => "servers",
            Self::OpenCode => "mcp",
            Self::CodexToml => "mcp_servers",
        }
    }

    /// Write or replace the stanza for `name`.
    pub fn upsert(self, path: &Path, name: &str, spec: &McpServerSpec) -> Result<()> {
        let raw = read_or_empty(path)?;
        let out = match self {
            Self::CodexToml => {
                let mut doc = parse_toml(&raw)?;
                let servers = toml_servers_mut(&mut doc, path)?;
                servers.insert(name, Item::Table(render_toml(spec)));
                doc.to_string()
            },
            _ => {
                let mut root = parse_json(&raw, path)?;
                let servers = json_servers_mut(&mut root, self.root_key(), path)?;
                servers.insert(name.to_string(), self.render_json(spec));
                pretty(&root)?
            },
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Remove the stanza for `name`. Missing files and entries are not errors.
    pub fn remove(self, path: &Path, name: &str) -> Result<bool> {
        if !path.is_file() {
            return Ok(false);
        }
        let raw = std::fs::read_to_string(path)?;
        let (removed, out) = match self {
            Self::CodexToml => {
                let mut doc = parse_toml(&raw)?;
                let removed = doc
                    .get_mut(self.root_key())
                    .and_then(Item::as_table_like_mut)
                    .and_then(|t| t.remove(name))
                    .is_some();
                (removed, doc.to_string())
            },
            _ => {
                let mut root = parse_json(&raw, path)?;
                let removed = root
                    .get_mut(self.root_key())
                    .and_then(Value::as_object_mut)
                    .and_then(|m| m.remove(name))
                    .is_some();
                (removed, pretty(&root)?)
            },
        };
        if removed {
            std::fs::write(path, out)?;
        }
        Ok(removed)
    }

    /// Read back the stanza for `name`, if present and well-formed.
    pub fn read(self, path: &Path, name: &str) -> Result<Option<McpServerSpec>> {
        if !path.is_file() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(match self {
            Self::CodexToml => {
                let doc = parse_toml(&raw)?;
                doc.get(self.root_key())
                    .and_then(|s| s.get(name))
                    .and_then(parse_toml_entry)
            },
            _ => {
                let root = parse_json(&raw, path)?;
                root.get(self.root_key())
                    .and_then(|s| s.get(name))
                    .and_then(|v| self.parse_json(v))
            },
        })
    }

    fn render_json(self, spec: &McpServerSpec) -> Value {
        match (self, spec) {
            (Self::OpenCode, McpServerSpec::Stdio { command, args, env }) => {
                let mut cmd = vec![command.clone()];
                cmd.extend(args.iter().cloned());
                let mut v = json!({"type": "local", "command": cmd, "enabled": true});
                if !env.is_empty() {
                    v["environment"] = json!(env);
                }
                v
            },
            (Self::OpenCode, McpServerSpec::Remote { url, .. }) => {
                json!({"type": "remote", "url": url, "enabled": true})
            },
            (_, McpServerSpec::Stdio { command, args, env }) => {
                let mut v = json!({"command": command, "args": args});
                if self == Self::VsCodeServers {
                    v["type"] = json!("stdio");
                }
                if !env.is_empty() {
                    v["env"] = json!(env);
                }
                v
            },
            (_, McpServerSpec::Remote { url, transport }) => {
                json!({"type": transport.as_str(), "url": url})
            },
        }
    }

    fn parse_json(self, v: &Value) -> Option<McpServerSpec> {
        let str_map = |v: Option<&Value>| -> BTreeMap<String, String> {
            v.and_then(Value::as_object)
                .map(|m| {
                    m.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default()
        };
        let str_vec = |v: Option<&Value>| -> Vec<String> {
            v.and_then(Value::as_array)
                .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };

        if let Some(url) = v.get("url").and_then(Value::as_str) {
            let transport = v
                .get("type")
                .and_then(Value::as_str)
                .map(RemoteTransport::parse)
                .unwrap_or_default();
            return Some(McpServerSpec::Remote {
                url: url.to_string(),
                transport,
            });
        }

        if self == Self::OpenCode {
            let mut cmd = str_vec(v.get("command")).into_iter();
            let command = cmd.next()?;
            return Some(McpServerSpec::Stdio {
                command,
                args: cmd.collect(),
                env: str_map(v.get("environment")),
            });
        }

        Some(McpServerSpec::Stdio {
            command: v.get("command")?.as_str()?.to_string(),
            args: str_vec(v.get("args")),
            env: str_map(v.get("env")),
        })
    }
}

fn render_toml(spec: &McpServerSpec) -> toml_edit::Table {
    let mut t = toml_edit::Table::new();
    match spec {
        McpServerSpec::Stdio { command, args, env } => {
            t["command"] = toml_edit::value(command.as_str());
            t["args"] = toml_edit::value(args.iter().map(String::as_str).collect::<toml_edit::Array>());
            if !env.is_empty() {
                let mut inline = InlineTable::new();
                for (k, v) in env {
                    inline.insert(k.as_str(), v.as_str().into());
                }
                t["env"] = toml_edit::value(inline);
            }
        },
        McpServerSpec::Remote { url, .. } => {
            t["url"] = toml_edit::value(url.as_str());
        },
    }
    t
}

fn parse_toml_entry(item: &Item) -> Option<McpServerSpec> {
    if let Some(url) = item.get("url").and_then(Item::as_str) {
        return Some(McpServerSpec::Remote {
            url: url.to_string(),
            transport: RemoteTransport::Http,
        });
    }
    let command = item.get("command").and_then(Item::as_str)?.to_string();
    let args = item
        .get("args")
        .and_then(Item::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let env = item
        .get("env")
        .and_then(Item::as_table_like)
        .map(|t| {
            t.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.to_string(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();
    Some(McpServerSpec::Stdio { command, args, env })
}

fn read_or_empty(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

fn parse_json(raw: &str, path: &Path) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    let v: Value = serde_json::from_str(raw)?;
    if !v.is_object() {
        return Err(Error::invalid_config(path, "top level is not a JSON object"));
    }
    Ok(v)
}

fn json_servers_mut<'a>(
    root: &'a mut Value,
    key: &str,
    path: &Path,
) -> Result<&'a mut Map<String, Value>> {
    let obj = root
        .as_object_mut()
        .ok_or_else(|| Error::invalid_config(path, "top level is not a JSON object"))?;
    obj.entry(key)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| Error::invalid_config(path, format!("`{key}` is not an object")))
}

fn parse_toml(raw: &str) -> Result<DocumentMut> {
    Ok(raw.parse::<DocumentMut>()?)
}

fn toml_servers_mut<'a>(doc: &'a mut DocumentMut, path: &Path) -> Result<&'a mut toml_edit::Table> {
    let item = doc.entry("mcp_servers").or_insert_with(|| {
        let mut t = toml_edit::Table::new();
        t.set_implicit(true);
        Item::Table(t)
    });
    item.as_table_mut()
        .ok_or_else(|| Error::invalid_config(path, "`mcp_servers` is not a table"))
}

fn pretty(v: &Value) -> Result<String> {
    let mut s = serde_json::to_string_pretty(v)?;
    s.push('\n');
    Ok(s)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn stdio() -> McpServerSpec {
        McpServerSpec::Stdio {
            command: "npx".into(),
            args: vec!["-y".into(), "@acme/mcp".into()],
            env: BTreeMap::from([("API_KEY".into(), "$API_KEY".into())]),
        }
    }

    fn remote() -> McpServerSpec {
        McpServerSpec::Remote {
            url: "https://mcp.example.com/sse".into(),
            transport: RemoteTransport::Sse,
        }
    }

    #[rstest]
    #[case(McpFormat::McpServers, "mcp.json")]
    #[case(McpFormat::VsCodeServers, "mcp.json")]
    #[case(McpFormat::OpenCode, "opencode.json")]
    #[case(McpFormat::CodexToml, "config.toml")]
    fn upsert_read_remove(#[case] format: McpFormat, #[case] file: &str) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join(file);

        format.upsert(&path, "acme", &stdio()).unwrap();
        assert_eq!(format.read(&path, "acme").unwrap(), Some(stdio()));

        format.upsert(&path, "acme", &stdio()).unwrap();
        assert!(format.remove(&path, "acme").unwrap());
        assert!(!format.remove(&path, "acme").unwrap());
        assert_eq!(format.read(&path, "acme").unwrap(), None);
    }

    #[test]
    fn json_merge_preserves_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".mcp.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"mine": {"command": "my-server"}}, "other": 1}"#,
        )
        .unwrap();

        McpFormat::McpServers.upsert(&path, "acme", &remote()).unwrap();
        let v: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["other"], 1);
        assert_eq!(v["mcpServers"]["mine"]["command"], "my-server");
        assert_eq!(v["mcpServers"]["acme"]["type"], "sse");
        assert_eq!(McpFormat::McpServers.read(&path, "acme").unwrap(), Some(remote()));
    }

    #[test]
    fn toml_merge_preserves_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "# user settings\nmodel = \"o3\"\n").unwrap();

        McpFormat::CodexToml.upsert(&path, "acme", &stdio()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# user settings"));
        assert!(text.contains("[mcp_servers.acme]"));
        assert!(text.contains("model = \"o3\""));
    }

    #[test]
    fn opencode_uses_command_array() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("opencode.json");
        McpFormat::OpenCode.upsert(&path, "acme", &stdio()).unwrap();
        let v: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["mcp"]["acme"]["type"], "local");
        assert_eq!(v["mcp"]["acme"]["command"][0], "npx");
        assert_eq!(v["mcp"]["acme"]["environment"]["API_KEY"], "$API_KEY");
    }

    #[test]
    fn non_object_json_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".mcp.json");
        std::fs::write(&path, "[]").unwrap();
        let err = McpFormat::McpServers
            .upsert(&path, "acme", &stdio())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn remove_from_missing_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!McpFormat::CodexToml
            .remove(&tmp.path().join("none.toml"), "x")
            .unwrap());
    }
}
