//! SKILL.md front matter.
//!
//! A skill is any directory holding a `SKILL.md` file. The YAML front matter
//! may declare a cosmetic `name`, a `description`, a `license` and a
//! `targets` list restricting which sync targets receive the skill. None of
//! these ever participate in skill identity, which is path-derived.

use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;
use tracing::warn;

use crate::error::Result;

/// File name marking a directory as a skill.
pub const SKILL_FILE: &str = "SKILL.md";

/// Fields read from a SKILL.md front matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillFrontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    /// Target names the skill is limited to; `None` means every target.
    pub targets: Option<Vec<String>>,
}

/// Whether `dir` directly contains a `SKILL.md` regular file.
#[must_use]
pub fn has_skill_file(dir: &Path) -> bool {
    dir.join(SKILL_FILE).is_file()
}

/// Split `content` into (front matter, body).
///
/// Returns `None` when the document does not open with a `---` line or the
/// block is never closed.
#[must_use]
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let rest = trimmed.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    if let Some(body) = rest.strip_prefix("---") {
        return Some(("", body));
    }
    let close = rest.find("\n---")?;
    let frontmatter = &rest[..close];
    let body = rest[close + 4..].trim_start_matches(['\r', '\n']);
    Some((frontmatter, body))
}

/// Parse the front matter of a SKILL.md document.
///
/// A document without front matter yields the default (all fields empty).
pub fn parse_frontmatter(content: &str) -> Result<SkillFrontmatter> {
    let Some((raw, _body)) = split_frontmatter(content) else {
        return Ok(SkillFrontmatter::default());
    };
    if raw.trim().is_empty() {
        return Ok(SkillFrontmatter::default());
    }

    let value: Value = serde_yaml::from_str(raw)?;
    Ok(SkillFrontmatter {
        name: scalar_field(&value, "name"),
        description: scalar_field(&value, "description"),
        license: scalar_field(&value, "license"),
        targets: list_field(&value, "targets"),
    })
}

/// Read and parse `<skill_dir>/SKILL.md`, logging instead of failing.
///
/// Front matter is cosmetic, so unreadable or malformed files produce `None`.
#[must_use]
pub fn read_frontmatter(skill_dir: &Path) -> Option<SkillFrontmatter> {
    let path = skill_dir.join(SKILL_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable SKILL.md");
            return None;
        }
    };
    match parse_frontmatter(&content) {
        Ok(frontmatter) => Some(frontmatter),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "malformed SKILL.md front matter");
            None
        }
    }
}

/// License declared by the skill at `skill_dir`, or an empty string.
#[must_use]
pub fn read_license(skill_dir: &Path) -> String {
    read_frontmatter(skill_dir)
        .and_then(|fm| fm.license)
        .unwrap_or_default()
}

fn scalar_field(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// A YAML sequence of scalars, or a single scalar, as a list of strings.
fn list_field(value: &Value, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = match value.get(key)? {
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => return None,
    };
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // split_frontmatter tests
    // =========================================================================

    #[test]
    fn split_basic_document() {
        let doc = "---\nname: pdf\n---\n# PDF\n";
        let (fm, body) = split_frontmatter(doc).unwrap();
        assert_eq!(fm, "name: pdf");
        assert_eq!(body, "# PDF\n");
    }

    #[test]
    fn split_without_frontmatter() {
        assert!(split_frontmatter("# Just a heading").is_none());
    }

    #[test]
    fn split_unclosed_frontmatter() {
        assert!(split_frontmatter("---\nname: x\n# no close").is_none());
    }

    #[test]
    fn split_empty_frontmatter() {
        let (fm, body) = split_frontmatter("---\n---\nbody").unwrap();
        assert_eq!(fm, "");
        assert_eq!(body, "\nbody");
    }

    #[test]
    fn split_crlf_document() {
        let doc = "---\r\nname: pdf\r\n---\r\nbody";
        let (fm, _) = split_frontmatter(doc).unwrap();
        assert!(fm.contains("name: pdf"));
    }

    // =========================================================================
    // parse_frontmatter tests
    // =========================================================================

    #[test]
    fn parse_all_fields() {
        let doc = "---\nname: planner\ndescription: Plans work\nlicense: MIT\n---\nbody";
        let fm = parse_frontmatter(doc).unwrap();
        assert_eq!(fm.name.as_deref(), Some("planner"));
        assert_eq!(fm.description.as_deref(), Some("Plans work"));
        assert_eq!(fm.license.as_deref(), Some("MIT"));
    }

    #[test]
    fn parse_block_scalar_license() {
        let doc = "---\nname: x\nlicense: |\n  Apache-2.0\n---\n";
        let fm = parse_frontmatter(doc).unwrap();
        assert_eq!(fm.license.as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn parse_targets_list() {
        let fm = parse_frontmatter("---\nname: x\ntargets: [claude, codex]\n---\n").unwrap();
        assert_eq!(
            fm.targets,
            Some(vec!["claude".to_string(), "codex".to_string()])
        );

        let fm = parse_frontmatter("---\nname: x\ntargets:\n  - cursor\n---\n").unwrap();
        assert_eq!(fm.targets, Some(vec!["cursor".to_string()]));

        let fm = parse_frontmatter("---\nname: x\ntargets: claude\n---\n").unwrap();
        assert_eq!(fm.targets, Some(vec!["claude".to_string()]));

        let fm = parse_frontmatter("---\nname: x\n---\n").unwrap();
        assert!(fm.targets.is_none());
    }

    #[test]
    fn parse_missing_license_is_none() {
        let fm = parse_frontmatter("---\nname: x\n---\n").unwrap();
        assert!(fm.license.is_none());
    }

    #[test]
    fn parse_no_frontmatter_is_default() {
        let fm = parse_frontmatter("plain markdown").unwrap();
        assert_eq!(fm, SkillFrontmatter::default());
    }

    #[test]
    fn parse_invalid_yaml_is_error() {
        assert!(parse_frontmatter("---\nname: [unclosed\n---\n").is_err());
    }

    // =========================================================================
    // filesystem helpers
    // =========================================================================

    #[test]
    fn read_license_from_skill_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(SKILL_FILE),
            "---\nname: x\nlicense: BSD-3-Clause\n---\n",
        )
        .unwrap();
        assert!(has_skill_file(temp.path()));
        assert_eq!(read_license(temp.path()), "BSD-3-Clause");
    }

    #[test]
    fn read_license_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(!has_skill_file(temp.path()));
        assert_eq!(read_license(temp.path()), "");
    }

    #[test]
    fn read_license_malformed_is_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SKILL_FILE), "---\n: : :\n  - [\n---\n").unwrap();
        assert_eq!(read_license(temp.path()), "");
    }
}
