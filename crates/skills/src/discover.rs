use std::path::Path;

use {duckrow_agents::CANONICAL_SKILLS_DIR, tracing::warn};

use crate::{
    parse::{self, SKILL_FILE},
    types::SkillMetadata,
};

/// Find skills in a checked-out tree.
///
/// Looks at `root/sub_path` itself and its immediate subdirectories only.
/// Deeper nesting is not searched. `root_name` names a skill found at the
/// base directory itself.
pub fn discover(root: &Path, sub_path: Option<&str>, root_name: &str) -> Vec<SkillMetadata> {
    let base = match sub_path {
        Some(sub) => root.join(sub),
        None => root.to_path_buf(),
    };
    if !base.is_dir() {
        return Vec::new();
    }

    let mut skills = Vec::new();
    if base.join(SKILL_FILE).is_file() {
        push_parsed(&base, root_name, &mut skills);
    }
    discover_flat(&base, &mut skills);
    skills
}

/// Skills currently materialized under `<project>/.agents/skills/`.
pub fn list_installed(project: &Path) -> Vec<SkillMetadata> {
    let mut skills = Vec::new();
    discover_flat(&project.join(CANONICAL_SKILLS_DIR), &mut skills);
    skills
}

/// One level of `<dir>/<name>/SKILL.md`, sorted by directory name.
fn discover_flat(dir: &Path, skills: &mut Vec<SkillMetadata>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    let mut dirs: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(SKILL_FILE).is_file())
        .collect();
    dirs.sort();

    for skill_dir in dirs {
        let Some(name) = skill_dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        push_parsed(&skill_dir, &name, skills);
    }
}

fn push_parsed(dir: &Path, name: &str, skills: &mut Vec<SkillMetadata>) {
    if !parse::validate_name(name) {
        warn!(dir = %dir.display(), %name, "skipping skill with unusable directory name");
        return;
    }
    match parse::read_metadata(dir, name) {
        Ok(meta) => skills.push(meta),
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to parse SKILL.md"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join(SKILL_FILE),
            format!("---\nname: {name}\ndescription: test\n---\nbody\n"),
        )
        .unwrap();
    }

    #[test]
    fn finds_root_and_immediate_children_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_skill(root, "top");
        write_skill(&root.join("a"), "a");
        write_skill(&root.join("b"), "b");
        write_skill(&root.join("nested/deep"), "deep");
        std::fs::create_dir_all(root.join("docs")).unwrap();

        let names: Vec<_> = discover(root, None, "repo")
            .into_iter()
            .map(|m| m.dir_name)
            .collect();
        assert_eq!(names, vec!["repo", "a", "b"]);
    }

    #[test]
    fn restricts_to_sub_path() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_skill(&root.join("a"), "a");
        write_skill(&root.join("skills/lint"), "lint");
        write_skill(&root.join("skills/fmt"), "fmt");

        let names: Vec<_> = discover(root, Some("skills"), "skills")
            .into_iter()
            .map(|m| m.dir_name)
            .collect();
        assert_eq!(names, vec!["fmt", "lint"]);

        let single = discover(root, Some("skills/lint"), "lint");
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].dir_name, "lint");
    }

    #[test]
    fn missing_sub_path_finds_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover(tmp.path(), Some("nope"), "nope").is_empty());
    }

    #[test]
    fn malformed_skill_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("bad");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join(SKILL_FILE), "no frontmatter").unwrap();
        write_skill(&tmp.path().join("good"), "good");
        let found = discover(tmp.path(), None, "root");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dir_name, "good");
    }

    #[test]
    fn lists_installed_skills() {
        let tmp = tempfile::tempdir().unwrap();
        write_skill(&tmp.path().join(".agents/skills/review"), "review");
        let installed = list_installed(tmp.path());
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "review");
        assert!(list_installed(&tmp.path().join("empty")).is_empty());
    }
}
