use std::{collections::BTreeMap, path::Path};

use {
    duckrow_common::Warned,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::warn,
};

use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "duckrow.json";

/// A registry's `duckrow.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub skills: Vec<SkillEntry>,
    pub mcps: Vec<McpEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `host/owner/repo[/sub/path]`.
    pub source: String,
    /// Ref to install from when the source has no `#ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl SkillEntry {
    pub fn pinned_commit(&self) -> Option<&str> {
        self.commit.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpType {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// `KEY=VALUE` pairs. A JSON object is accepted too.
    #[serde(default, deserialize_with = "env_list", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<McpType>,
}

impl McpEntry {
    /// Explicit `type`, else stdio for commands and http for URLs.
    pub fn effective_type(&self) -> McpType {
        match (self.kind, &self.command) {
            (Some(kind), _) => kind,
            (None, Some(_)) => McpType::Stdio,
            (None, None) => McpType::Http,
        }
    }

    /// `env` split into a map. Entries without `=` map to an empty value.
    pub fn env_map(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
                let k = k.trim();
                (!k.is_empty()).then(|| (k.to_string(), v.to_string()))
            })
            .collect()
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("missing name".into());
        }
        let has_command = self.command.as_deref().is_some_and(|c| !c.trim().is_empty());
        let has_url = self.url.as_deref().is_some_and(|u| !u.trim().is_empty());
        match (has_command, has_url) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err("has both command and url".into()),
            (false, false) => Err("needs a command or a url".into()),
        }
    }
}

fn env_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Env {
        List(Vec<String>),
        Map(BTreeMap<String, String>),
    }
    Ok(match Env::deserialize(deserializer)? {
        Env::List(list) => list,
        Env::Map(map) => map.into_iter().map(|(k, v)| format!("{k}={v}")).collect(),
    })
}

/// Parse manifest JSON. Malformed entries are dropped with a warning; only
/// an unreadable document is an error.
pub fn parse_manifest(data: &str, path: &Path) -> Result<Warned<Manifest>> {
    let root: Value = serde_json::from_str(data).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let Value::Object(mut root) = root else {
        return Err(Error::Manifest {
            path: path.to_path_buf(),
            reason: "top level must be a JSON object".into(),
        });
    };

    let mut out = Warned::new(Manifest {
        name: string_field(&root, "name"),
        description: string_field(&root, "description"),
        ..Default::default()
    });

    let skills = take_array(&mut root, "skills", &mut out.warnings);
    for (i, raw) in skills.into_iter().enumerate() {
        match serde_json::from_value::<SkillEntry>(raw) {
            Ok(entry) if entry.name.trim().is_empty() => {
                out.warn(format!("skills[{i}]: missing name"));
            },
            Ok(entry) if entry.source.trim().is_empty() => {
                out.warn(format!("skills[{i}] '{}': missing source", entry.name));
            },
            Ok(entry) => out.value.skills.push(entry),
            Err(e) => out.warn(format!("skills[{i}]: {e}")),
        }
    }

    let mcps = take_array(&mut root, "mcps", &mut out.warnings);
    for (i, raw) in mcps.into_iter().enumerate() {
        match serde_json::from_value::<McpEntry>(raw) {
            Ok(entry) => match entry.validate() {
                Ok(()) => out.value.mcps.push(entry),
                Err(reason) => out.warn(format!("mcps[{i}] '{}': {reason}", entry.name)),
            },
            Err(e) => out.warn(format!("mcps[{i}]: {e}")),
        }
    }

    for w in &out.warnings {
        warn!(manifest = %path.display(), warning = %w, "skipping manifest entry");
    }
    Ok(out)
}

/// Read `<dir>/duckrow.json`.
pub fn load_manifest(dir: &Path) -> Result<Warned<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    let data = std::fs::read_to_string(&path).map_err(|e| Error::Manifest {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    parse_manifest(&data, &path)
}

fn string_field(root: &serde_json::Map<String, Value>, key: &str) -> String {
    root.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn take_array(
    root: &mut serde_json::Map<String, Value>,
    key: &str,
    warnings: &mut Vec<String>,
) -> Vec<Value> {
    match root.remove(key) {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(_) => {
            warnings.push(format!("'{key}' is not an array"));
            Vec::new()
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(data: &str) -> Warned<Manifest> {
        parse_manifest(data, Path::new("duckrow.json")).unwrap()
    }

    #[test]
    fn parses_full_manifest() {
        let m = parse(
            r#"{
                "name": "team",
                "description": "Team assets",
                "skills": [
                    {"name": "review", "source": "github.com/acme/skills/review", "commit": "abc"},
                    {"name": "lint", "source": "github.com/acme/skills/lint", "version": "v2"}
                ],
                "mcps": [
                    {"name": "db", "command": "npx", "args": ["db-mcp"], "env": ["API_KEY=$API_KEY"]},
                    {"name": "docs", "url": "https://docs.example.com/mcp", "type": "sse"}
                ]
            }"#,
        );
        assert!(!m.has_warnings());
        assert_eq!(m.value.name, "team");
        assert_eq!(m.value.skills[0].pinned_commit(), Some("abc"));
        assert_eq!(m.value.skills[1].version.as_deref(), Some("v2"));
        assert_eq!(m.value.mcps[0].effective_type(), McpType::Stdio);
        assert_eq!(m.value.mcps[1].effective_type(), McpType::Sse);
        assert_eq!(m.value.mcps[0].env_map()["API_KEY"], "$API_KEY");
    }

    #[test]
    fn malformed_entries_become_warnings() {
        let m = parse(
            r#"{
                "name": "team",
                "skills": [
                    {"name": "ok", "source": "github.com/a/b"},
                    {"name": "nosource"},
                    42
                ],
                "mcps": [
                    {"name": "both", "command": "x", "url": "https://x"},
                    {"name": "neither"},
                    {"name": "fine", "url": "https://x"}
                ]
            }"#,
        );
        assert_eq!(m.value.skills.len(), 1);
        assert_eq!(m.value.mcps.len(), 1);
        assert_eq!(m.warnings.len(), 4);
        assert!(m.warnings.iter().any(|w| w.contains("both command and url")));
    }

    #[test]
    fn env_object_is_accepted() {
        let m = parse(r#"{"mcps": [{"name": "x", "command": "run", "env": {"TOKEN": "${TOKEN}"}}]}"#);
        assert_eq!(m.value.mcps[0].env, vec!["TOKEN=${TOKEN}"]);
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(matches!(
            parse_manifest("[]", Path::new("duckrow.json")),
            Err(Error::Manifest { .. })
        ));
        assert!(parse_manifest("{", Path::new("duckrow.json")).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(load_manifest(tmp.path()), Err(Error::Manifest { .. })));
    }
}
