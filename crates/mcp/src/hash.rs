use {
    duckrow_agents::McpServerSpec,
    sha2::{Digest, Sha256},
};

/// SHA-256 over the canonical JSON of a server definition, hex encoded.
///
/// Env is a sorted map, so equal definitions hash equally regardless of the
/// order entries were declared in.
pub fn config_hash(spec: &McpServerSpec) -> String {
    let canonical = serde_json::to_vec(spec).unwrap_or_default();
    format!("{:x}", Sha256::digest(&canonical))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, std::collections::BTreeMap};

    fn stdio(env: &[(&str, &str)]) -> McpServerSpec {
        McpServerSpec::Stdio {
            command: "npx".into(),
            args: vec!["db-mcp".into()],
            env: env
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn order_independent_and_content_sensitive() {
        let a = config_hash(&stdio(&[("A", "1"), ("B", "2")]));
        let b = config_hash(&stdio(&[("B", "2"), ("A", "1")]));
        let c = config_hash(&stdio(&[("A", "1")]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
