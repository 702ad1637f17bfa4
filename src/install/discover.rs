//! Skill discovery.
//!
//! Fetches a source (cloning git sources into a private temp directory),
//! resolves the requested subdirectory, and walks the tree for every
//! directory holding a `SKILL.md`.

use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SkillsyncError};
use crate::skill_md::{SKILL_FILE, has_skill_file, read_license};
use crate::utils::fs::{GIT_DIR, slash_relative};
use crate::utils::git;

use super::source::SourceDescriptor;

/// Name of the per-source ignore file.
pub const SKILLIGNORE_FILE: &str = ".skillignore";

/// Relative path used for a skill at the discovery root.
pub const ROOT_PATH: &str = ".";

/// A skill found during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInfo {
    pub name: String,
    /// `/`-separated path from the discovery root, `"."` for the root itself.
    pub relative_path: String,
    /// License from front matter, empty when absent.
    pub license: String,
}

impl SkillInfo {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative_path == ROOT_PATH
    }
}

/// Outcome of discovering a source.
///
/// For git sources the clone lives in a temp directory owned by this value;
/// call [`Discovery::release`] when done. Dropping also removes it, but
/// errors are then swallowed.
#[derive(Debug)]
pub struct Discovery {
    pub source: SourceDescriptor,
    /// Directory the skills were discovered under (repo root plus subdir).
    pub root: PathBuf,
    pub skills: Vec<SkillInfo>,
    /// Commit checked out for git sources.
    pub commit: Option<String>,
    temp: Option<TempDir>,
}

impl Discovery {
    /// Absolute path of a discovered skill.
    #[must_use]
    pub fn skill_path(&self, skill: &SkillInfo) -> PathBuf {
        if skill.is_root() {
            self.root.clone()
        } else {
            self.root.join(&skill.relative_path)
        }
    }

    /// The skill at the discovery root, if any.
    #[must_use]
    pub fn root_skill(&self) -> Option<&SkillInfo> {
        self.skills.iter().find(|s| s.is_root())
    }

    /// Whether the source yielded more than one skill.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.skills.len() > 1
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.name.clone()).collect()
    }

    /// Select skills by exact name. An empty request selects everything.
    pub fn select(&self, names: &[String]) -> Result<Vec<SkillInfo>> {
        if names.is_empty() {
            return Ok(self.skills.clone());
        }
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let Some(skill) = self.skills.iter().find(|s| &s.name == name) else {
                return Err(SkillsyncError::SkillNotFound {
                    name: name.clone(),
                    available: self.names(),
                });
            };
            if !selected.contains(skill) {
                selected.push(skill.clone());
            }
        }
        Ok(selected)
    }

    /// Provenance string recorded for a discovered skill.
    #[must_use]
    pub fn provenance_for(&self, skill: &SkillInfo) -> String {
        if self.source.local_path.is_some() {
            return self.skill_path(skill).display().to_string();
        }
        let base = self.source.provenance();
        if skill.is_root() {
            base
        } else {
            format!("{base}/{}", skill.relative_path)
        }
    }

    /// Subdir inside the repository for a discovered skill.
    #[must_use]
    pub fn repo_subdir_for(&self, skill: &SkillInfo) -> Option<String> {
        match (&self.source.subdir, skill.is_root()) {
            (Some(sub), true) => Some(sub.clone()),
            (Some(sub), false) => Some(format!("{sub}/{}", skill.relative_path)),
            (None, true) => None,
            (None, false) => Some(skill.relative_path.clone()),
        }
    }

    /// Remove the temp clone, if one was made.
    pub fn release(mut self) -> Result<()> {
        if let Some(temp) = self.temp.take() {
            debug!(path = %temp.path().display(), "releasing discovery clone");
            temp.close()?;
        }
        Ok(())
    }
}

/// Discover the skills offered by `source`.
pub fn discover(source: &SourceDescriptor) -> Result<Discovery> {
    let mut source = source.clone();
    let (repo_root, temp, commit) = fetch(&source)?;

    let root = match source.subdir.clone() {
        Some(subdir) => {
            let resolved = resolve_subdir(&repo_root, &subdir)?;
            if resolved != subdir {
                info!(requested = %subdir, resolved = %resolved, "resolved subdirectory by name");
                source.set_resolved_subdir(&resolved);
            }
            repo_root.join(&resolved)
        }
        None => repo_root,
    };

    let skills = discover_skills(&root, &source.resolved_name);
    debug!(root = %root.display(), count = skills.len(), "discovery complete");

    Ok(Discovery {
        source,
        root,
        skills,
        commit,
        temp,
    })
}

type Fetched = (PathBuf, Option<TempDir>, Option<String>);

fn fetch(source: &SourceDescriptor) -> Result<Fetched> {
    if let Some(path) = &source.local_path {
        if !path.exists() {
            return Err(SkillsyncError::InvalidSource {
                input: source.raw_input.clone(),
                reason: format!("path does not exist: {}", path.display()),
            });
        }
        if !path.is_dir() {
            return Err(SkillsyncError::InvalidSource {
                input: source.raw_input.clone(),
                reason: format!("not a directory: {}", path.display()),
            });
        }
        return Ok((path.clone(), None, None));
    }

    let Some(url) = source.clone_url.as_deref() else {
        return Err(SkillsyncError::InvalidSource {
            input: source.raw_input.clone(),
            reason: "no clone URL".to_string(),
        });
    };
    let temp = TempDir::with_prefix("skillsync-discover-")?;
    let repo_path = temp.path().join("repo");
    let repo = git::clone(url, &repo_path, true)?;
    let commit = git::head_commit(&repo);
    Ok((repo_path, Some(temp), commit))
}

/// Resolve `subdir` inside `repo_root`: the literal path when it exists,
/// otherwise the shallowest skill directory whose basename matches the last
/// segment (ties broken by path).
pub fn resolve_subdir(repo_root: &Path, subdir: &str) -> Result<String> {
    let exact = repo_root.join(subdir);
    if exact.is_dir() {
        return Ok(subdir.to_string());
    }

    let wanted = subdir.rsplit('/').next().unwrap_or(subdir);
    let candidate = walk_skill_dirs(repo_root)
        .into_iter()
        .filter(|rel| !rel.is_empty() && rel.rsplit('/').next() == Some(wanted))
        .min_by(|a, b| {
            let depth = |p: &String| p.matches('/').count();
            depth(a).cmp(&depth(b)).then_with(|| a.cmp(b))
        });

    candidate.ok_or_else(|| SkillsyncError::SubdirNotFound {
        subdir: subdir.to_string(),
        root: repo_root.display().to_string(),
    })
}

/// Find skills under `root`, applying `.skillignore`. A skill at `root`
/// itself is reported with path `"."` and named `root_name`.
pub fn discover_skills(root: &Path, root_name: &str) -> Vec<SkillInfo> {
    let ignore = read_skillignore(root);
    let mut skills: Vec<SkillInfo> = walk_skill_dirs(root)
        .into_iter()
        .filter(|rel| rel.is_empty() || !is_ignored(rel, &ignore))
        .map(|rel| {
            if rel.is_empty() {
                SkillInfo {
                    name: root_name.to_string(),
                    relative_path: ROOT_PATH.to_string(),
                    license: read_license(root),
                }
            } else {
                let dir = root.join(&rel);
                SkillInfo {
                    name: rel.rsplit('/').next().unwrap_or(&rel).to_string(),
                    license: read_license(&dir),
                    relative_path: rel,
                }
            }
        })
        .collect();

    skills.sort_by(|a, b| {
        b.is_root()
            .cmp(&a.is_root())
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    skills
}

/// Relative paths of every directory under `root` holding a SKILL.md,
/// `""` for `root` itself. Hidden directories are walked, `.git` is not,
/// and symlinked directories are never descended into.
fn walk_skill_dirs(root: &Path) -> Vec<String> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == GIT_DIR));

    let mut dirs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during discovery");
                continue;
            }
        };
        if entry.file_name() != SKILL_FILE || entry.file_type().is_dir() {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        if !has_skill_file(dir) {
            continue;
        }
        if let Some(rel) = slash_relative(root, dir) {
            dirs.push(rel);
        }
    }
    dirs
}

/// Patterns from `<root>/.skillignore`; blank lines and `#` comments skipped.
pub fn read_skillignore(root: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(root.join(SKILLIGNORE_FILE)) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Whether a discovered path is ignored: a glob match on the path, or the
/// pattern naming one of its ancestor directories.
fn is_ignored(rel: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|raw| {
        let pattern = raw.trim_end_matches('/');
        if rel == pattern || rel.starts_with(&format!("{pattern}/")) {
            return true;
        }
        match Pattern::new(pattern) {
            Ok(glob) => glob.matches(rel),
            Err(err) => {
                warn!(pattern = %raw, error = %err, "invalid .skillignore pattern");
                false
            }
        }
    })
}
