use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillsyncError};
use crate::install::installer::validate_subgroup;
use crate::sync::config::{SyncMode, TargetConfig, validate_target_name};
use crate::utils::fs::expand_tilde;

/// Directory name for the project config layer and the global config dir.
pub const CONFIG_DIR_NAME: &str = "skillsync";
pub const PROJECT_CONFIG_DIR: &str = ".skillsync";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetEntry>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path (or `SKILLSYNC_CONFIG`) replaces the global and
    /// project layers. Environment overrides always apply last.
    pub fn load(explicit_path: Option<&Path>, cwd: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| env_string("SKILLSYNC_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                SkillsyncError::MissingConfig(format!("config file not found: {}", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(cwd)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Path of the global config file, if the platform has a config dir.
    #[must_use]
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
    }

    #[must_use]
    pub fn project_path(cwd: &Path) -> PathBuf {
        cwd.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match Self::global_path() {
            Some(path) => Self::load_patch(&path),
            None => Ok(None),
        }
    }

    fn load_project(cwd: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&Self::project_path(cwd))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path).map_err(|err| {
            SkillsyncError::Config(format!("read config {}: {err}", path.display()))
        })?;
        let patch = toml::from_str(&raw).map_err(|err| {
            SkillsyncError::Config(format!("parse config {}: {err}", path.display()))
        })?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.source {
            self.source.merge(patch);
        }
        if let Some(patch) = patch.sync {
            self.sync.merge(patch);
        }
        if let Some(patch) = patch.install {
            self.install.merge(patch);
        }
        if let Some(patch) = patch.output {
            self.output.merge(patch);
        }
        for (name, patch) in patch.targets.unwrap_or_default() {
            self.targets.entry(name).or_default().merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("SKILLSYNC_SOURCE").filter(|v| !v.trim().is_empty()) {
            self.source.path = path;
        }
        if let Some(mode) = lookup("SKILLSYNC_MODE") {
            self.sync.mode = SyncMode::from_str(mode.trim()).map_err(|_| {
                SkillsyncError::Config(format!(
                    "invalid SKILLSYNC_MODE value {mode} (use symlink|merge|copy)"
                ))
            })?;
        }
        if let Some(value) = lookup("SKILLSYNC_ROBOT") {
            self.output.robot = parse_bool(&value);
        }
        if let Some(into) = lookup("SKILLSYNC_INSTALL_INTO") {
            let into = into.trim();
            self.install.into = (!into.is_empty()).then(|| into.to_string());
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.path.trim().is_empty() {
            return Err(SkillsyncError::Config("source.path cannot be empty".into()));
        }
        if let Some(into) = &self.install.into {
            validate_subgroup(into)
                .map_err(|err| SkillsyncError::Config(format!("install.into: {err}")))?;
        }
        for (name, entry) in &self.targets {
            validate_target_name(name)?;
            if entry.path.trim().is_empty() {
                return Err(SkillsyncError::Config(format!(
                    "targets.{name}.path is required"
                )));
            }
        }
        Ok(())
    }

    /// Root of the managed tree, with `~` expanded.
    #[must_use]
    pub fn source_root(&self) -> PathBuf {
        expand_tilde(&self.source.path)
    }

    /// Resolved targets in name order; targets without a mode use `sync.mode`.
    #[must_use]
    pub fn target_configs(&self) -> Vec<TargetConfig> {
        self.targets
            .iter()
            .map(|(name, entry)| TargetConfig {
                name: name.clone(),
                path: expand_tilde(&entry.path),
                mode: entry.mode.unwrap_or(self.sync.mode),
                include: entry.include.clone(),
                exclude: entry.exclude.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/skillsync/skills".to_string(),
        }
    }
}

impl SourceConfig {
    fn merge(&mut self, patch: SourcePatch) {
        if let Some(path) = patch.path {
            self.path = path;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub mode: SyncMode,
}

impl SyncSettings {
    fn merge(&mut self, patch: SyncPatch) {
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Default subgroup for `install` when `--into` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into: Option<String>,
}

impl InstallConfig {
    fn merge(&mut self, patch: InstallPatch) {
        if let Some(into) = patch.into {
            self.into = Some(into);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub robot: bool,
}

impl OutputConfig {
    fn merge(&mut self, patch: OutputPatch) {
        if let Some(robot) = patch.robot {
            self.robot = robot;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetEntry {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<SyncMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl TargetEntry {
    fn merge(&mut self, patch: TargetPatch) {
        if let Some(path) = patch.path {
            self.path = path;
        }
        if let Some(mode) = patch.mode {
            self.mode = Some(mode);
        }
        if let Some(values) = patch.include {
            self.include = merge_unique(values, &self.include);
        }
        if let Some(values) = patch.exclude {
            self.exclude = merge_unique(values, &self.exclude);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub source: Option<SourcePatch>,
    pub sync: Option<SyncPatch>,
    pub install: Option<InstallPatch>,
    pub output: Option<OutputPatch>,
    pub targets: Option<BTreeMap<String, TargetPatch>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SourcePatch {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SyncPatch {
    pub mode: Option<SyncMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InstallPatch {
    pub into: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OutputPatch {
    pub robot: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TargetPatch {
    pub path: Option<String>,
    pub mode: Option<SyncMode>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

fn merge_unique(values: Vec<String>, existing: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in existing.iter().cloned().chain(values) {
        if seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
