//! Managed-tree inventory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SkillsyncError};
use crate::skill_md::{SKILL_FILE, has_skill_file, read_frontmatter};
use crate::utils::fs::{GIT_DIR, slash_relative};

use super::flatten::flatten;

/// A skill in the managed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSkill {
    /// `/`-separated path from the managed root; the skill's identity.
    pub rel_path: String,
    pub flat_name: String,
    pub path: PathBuf,
    /// Cosmetic name from front matter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontmatter_name: Option<String>,
    /// Target names from front matter `targets`; `None` means every target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
}

impl SourceSkill {
    /// Whether the skill's own `targets` list admits the target named `target`.
    #[must_use]
    pub fn allows_target(&self, target: &str) -> bool {
        self.targets
            .as_ref()
            .is_none_or(|names| names.iter().any(|name| name == target))
    }
}

/// Every skill below `root`, sorted by relative path.
///
/// The root itself is never a skill here, `.git` is skipped, and symlinked
/// directories are not followed.
pub fn scan(root: &Path) -> Result<Vec<SourceSkill>> {
    if !root.is_dir() {
        return Err(SkillsyncError::Config(format!(
            "source directory not found: {}",
            root.display()
        )));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == GIT_DIR));

    let mut skills = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry in source tree");
                continue;
            }
        };
        if entry.file_name() != SKILL_FILE || entry.file_type().is_dir() {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        if dir == root || !has_skill_file(dir) {
            continue;
        }
        let Some(rel_path) = slash_relative(root, dir) else {
            continue;
        };
        let frontmatter = read_frontmatter(dir).unwrap_or_default();
        skills.push(SourceSkill {
            flat_name: flatten(&rel_path),
            path: dir.to_path_buf(),
            frontmatter_name: frontmatter.name,
            targets: frontmatter.targets,
            rel_path,
        });
    }

    skills.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!(root = %root.display(), count = skills.len(), "scanned source tree");
    Ok(skills)
}
