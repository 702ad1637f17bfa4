use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillsyncError};

/// How a target mirrors the managed tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// The target path is one link to the managed root.
    Symlink,
    /// One link per eligible skill inside the target directory.
    #[default]
    Merge,
    /// One real copy per eligible skill, tracked by a manifest.
    Copy,
}

impl SyncMode {
    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "symlink" => Ok(Self::Symlink),
            "merge" => Ok(Self::Merge),
            "copy" => Ok(Self::Copy),
            _ => Err(SkillsyncError::Config(format!(
                "unknown sync mode: {value} (use symlink|merge|copy)"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Symlink => "symlink",
            Self::Merge => "merge",
            Self::Copy => "copy",
        }
    }

    /// Whether the mode places per-skill entries in the target.
    #[must_use]
    pub const fn is_per_skill(self) -> bool {
        !matches!(self, Self::Symlink)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sync destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetConfig {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub mode: SyncMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, mode: SyncMode) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mode,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_include(mut self, patterns: &[&str]) -> Self {
        self.include = patterns.iter().map(|p| (*p).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, patterns: &[&str]) -> Self {
        self.exclude = patterns.iter().map(|p| (*p).to_string()).collect();
        self
    }
}

/// Target names become config table keys and report labels.
pub fn validate_target_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SkillsyncError::Config("target name cannot be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(SkillsyncError::Config(format!(
            "invalid target name: {name} (use letters, digits, '-', '_' or '.')"
        )));
    }
    Ok(())
}
