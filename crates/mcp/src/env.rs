use std::{collections::BTreeSet, sync::LazyLock};

use {
    duckrow_config::{EnvFiles, EnvSource},
    duckrow_registry::McpEntry,
    regex::Regex,
    serde::Serialize,
};

/// `$VAR` or `${VAR}`.
#[allow(clippy::expect_used)]
static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("env reference pattern compiles")
});

/// Variables an entry's `env` values reference, sorted and deduplicated.
pub fn required_env(entry: &McpEntry) -> Vec<String> {
    let mut names = BTreeSet::new();
    for value in entry.env_map().values() {
        for caps in ENV_REF.captures_iter(value) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                names.insert(m.as_str().to_string());
            }
        }
    }
    names.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvStatus {
    pub name: String,
    pub is_set: bool,
    pub source: Option<EnvSource>,
}

/// Answers whether required variables are available, and from where.
pub trait EnvResolver {
    fn resolve(&self, names: &[String]) -> Vec<EnvStatus>;
}

impl EnvResolver for EnvFiles {
    fn resolve(&self, names: &[String]) -> Vec<EnvStatus> {
        names
            .iter()
            .map(|name| {
                let source = self.lookup(name).map(|(_, source)| source);
                EnvStatus {
                    name: name.clone(),
                    is_set: source.is_some(),
                    source,
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, std::collections::BTreeMap};

    fn entry(env: &[&str]) -> McpEntry {
        McpEntry {
            name: "db".into(),
            description: String::new(),
            command: Some("npx".into()),
            args: vec![],
            env: env.iter().map(|s| (*s).to_string()).collect(),
            url: None,
            kind: None,
        }
    }

    #[test]
    fn extracts_both_reference_styles() {
        let e = entry(&[
            "API_KEY=$API_KEY",
            "URL=https://${DB_HOST}:5432/${DB_NAME}",
            "PLAIN=value",
            "AGAIN=$API_KEY",
        ]);
        assert_eq!(required_env(&e), vec!["API_KEY", "DB_HOST", "DB_NAME"]);
    }

    #[test]
    fn reference_pattern_compiles() {
        let caps = ENV_REF.captures("${TOKEN}").expect("braced reference matches");
        assert_eq!(caps.get(1).map(|m| m.as_str()), Some("TOKEN"));
        assert!(ENV_REF.captures("no references").is_none());
    }

    #[test]
    fn unset_variable_resolves_unset() {
        let e = entry(&["DUCKROW_TEST_UNSET_KEY_9F2=$DUCKROW_TEST_UNSET_KEY_9F2"]);
        let names = required_env(&e);
        assert_eq!(names, vec!["DUCKROW_TEST_UNSET_KEY_9F2"]);
        let status = EnvFiles::default().resolve(&names);
        assert_eq!(status, vec![EnvStatus {
            name: "DUCKROW_TEST_UNSET_KEY_9F2".into(),
            is_set: false,
            source: None,
        }]);
    }

    #[test]
    fn project_file_satisfies_requirement() {
        let files = EnvFiles::from_maps(
            BTreeMap::from([("DUCKROW_TEST_PROJECT_KEY_7C1".into(), "x".into())]),
            BTreeMap::new(),
        );
        let status = files.resolve(&["DUCKROW_TEST_PROJECT_KEY_7C1".to_string()]);
        assert!(status[0].is_set);
        assert_eq!(status[0].source, Some(EnvSource::ProjectFile));
    }
}
