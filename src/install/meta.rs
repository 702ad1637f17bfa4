//! Provenance metadata stored inside each installed skill.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::fs::read_optional;

use super::source::SourceDescriptor;

/// File name of the per-skill provenance record.
pub const META_FILE: &str = ".skillsync-meta.json";

/// How a skill was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMethod {
    LocalCopy,
    GitClone,
    GitCloneAndExtractSubdir,
}

impl InstallMethod {
    #[must_use]
    pub const fn for_source(source: &SourceDescriptor, subdir: Option<&str>) -> Self {
        if !source.is_git() {
            Self::LocalCopy
        } else if subdir.is_some() {
            Self::GitCloneAndExtractSubdir
        } else {
            Self::GitClone
        }
    }
}

/// Provenance of an installed skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMeta {
    /// Source string that re-resolves to this skill.
    pub source: String,
    /// Source type, e.g. `github-subdir`.
    #[serde(rename = "type")]
    pub source_type: String,
    pub install_method: InstallMethod,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// Commit the skill was installed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SkillMeta {
    #[must_use]
    pub fn new(source: &SourceDescriptor, provenance: String, subdir: Option<String>) -> Self {
        let install_method = InstallMethod::for_source(source, subdir.as_deref());
        let source_type = match (&subdir, source.has_subdir()) {
            (Some(_), false) => format!("{}-subdir", source.meta_type()),
            _ => source.meta_type(),
        };
        Self {
            source: provenance,
            source_type,
            install_method,
            installed_at: Utc::now(),
            repo_url: source.clone_url.clone(),
            subdir,
            version: None,
        }
    }
}

/// Read the metadata of the skill at `skill_dir`.
///
/// `Ok(None)` means no record exists, i.e. a hand-authored skill.
pub fn read_meta(skill_dir: &Path) -> Result<Option<SkillMeta>> {
    match read_optional(skill_dir.join(META_FILE))? {
        Some(content) => Ok(Some(serde_json::from_str(&content)?)),
        None => Ok(None),
    }
}

/// Write `meta` into `skill_dir`.
pub fn write_meta(skill_dir: &Path, meta: &SkillMeta) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    std::fs::write(skill_dir.join(META_FILE), json)?;
    Ok(())
}
