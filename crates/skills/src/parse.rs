use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    types::SkillMetadata,
};

pub const SKILL_FILE: &str = "SKILL.md";

/// Validate an install name: lowercase ASCII, digits, single hyphens, 1-64 chars.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.')
        && !name.starts_with(['-', '.'])
        && !name.ends_with('-')
        && !name.contains("--")
        && !name.contains("..")
}

#[derive(Deserialize, Default)]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Option<FrontmatterMetadata>,
}

#[derive(Deserialize, Default)]
struct FrontmatterMetadata {
    #[serde(default)]
    internal: bool,
}

/// Parse the frontmatter of a `SKILL.md` living in `dir`.
///
/// `fallback_name` is the directory name; it is used as the install name and
/// as the display name when the frontmatter has none.
pub fn parse_metadata(content: &str, dir: &Path, fallback_name: &str) -> Result<SkillMetadata> {
    let (frontmatter, _body) = split_frontmatter(content).map_err(|reason| Error::InvalidSkill {
        path: dir.join(SKILL_FILE).display().to_string(),
        reason,
    })?;
    let fm: Frontmatter = serde_yaml::from_str(frontmatter).map_err(|e| Error::InvalidSkill {
        path: dir.join(SKILL_FILE).display().to_string(),
        reason: e.to_string(),
    })?;

    let display_name = fm
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback_name.to_string());

    Ok(SkillMetadata {
        dir_name: fallback_name.to_string(),
        name: display_name,
        description: fm.description.unwrap_or_default().trim().to_string(),
        internal: fm.metadata.is_some_and(|m| m.internal),
        path: dir.to_path_buf(),
    })
}

/// Read and parse `<dir>/SKILL.md`.
pub fn read_metadata(dir: &Path, fallback_name: &str) -> Result<SkillMetadata> {
    let content = std::fs::read_to_string(dir.join(SKILL_FILE))?;
    parse_metadata(&content, dir, fallback_name)
}

/// Split SKILL.md content at `---` delimiters into (frontmatter, body).
fn split_frontmatter(content: &str) -> std::result::Result<(&str, &str), String> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return Err("must start with YAML frontmatter delimited by ---".into());
    };
    let Some(close_pos) = after_open.find("\n---") else {
        return Err("missing closing --- for frontmatter".into());
    };
    let frontmatter = after_open[..close_pos].trim();
    let body = after_open[close_pos + 4..].trim();
    Ok((frontmatter, body))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("code-review"));
        assert!(validate_name("a"));
        assert!(validate_name("go_style"));
        assert!(!validate_name(""));
        assert!(!validate_name("-bad"));
        assert!(!validate_name("Bad"));
        assert!(!validate_name("has space"));
        assert!(!validate_name(".."));
        assert!(!validate_name("a/b"));
        assert!(!validate_name(&"a".repeat(65)));
    }

    #[test]
    fn test_parse_metadata() {
        let content = "---\nname: Code Review\ndescription: Reviews diffs\n---\n\n# Review\n";
        let meta = parse_metadata(content, Path::new("/tmp/code-review"), "code-review").unwrap();
        assert_eq!(meta.name, "Code Review");
        assert_eq!(meta.dir_name, "code-review");
        assert_eq!(meta.description, "Reviews diffs");
        assert!(!meta.internal);
    }

    #[test]
    fn test_internal_flag() {
        let content = "---\nname: helper\nmetadata:\n  internal: true\n---\nbody\n";
        let meta = parse_metadata(content, Path::new("/tmp/helper"), "helper").unwrap();
        assert!(meta.internal);
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let content = "---\ndescription: nameless\n---\nbody\n";
        let meta = parse_metadata(content, Path::new("/tmp/lint"), "lint").unwrap();
        assert_eq!(meta.name, "lint");
    }

    #[test]
    fn test_missing_frontmatter() {
        let err = parse_metadata("# Just markdown", Path::new("/tmp/x"), "x").unwrap_err();
        assert!(matches!(err, Error::InvalidSkill { .. }));
    }

    #[test]
    fn test_missing_closing_delimiter() {
        assert!(parse_metadata("---\nname: x\n", Path::new("/tmp/x"), "x").is_err());
    }
}
