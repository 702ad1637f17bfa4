//! Read-only inspection of target state.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::utils::fs::{
    entry_exists, is_empty_dir, is_hidden, is_symlink, is_within, read_link_absolute,
    same_location,
};

use super::config::{SyncMode, TargetConfig};
use super::manifest::Manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetState {
    /// The target is a link to the managed root.
    Linked,
    NotExist,
    /// A real directory with content where a link is expected.
    HasFiles,
    /// A link that points somewhere other than the managed tree.
    Conflict,
    /// A link to the managed root that no longer resolves.
    Broken,
    /// A per-skill target directory; see the counts.
    Merged,
    Copied,
    /// Neither a directory nor a link.
    Unknown,
}

impl TargetState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linked => "linked",
            Self::NotExist => "not-exist",
            Self::HasFiles => "has-files",
            Self::Conflict => "conflict",
            Self::Broken => "broken",
            Self::Merged => "merged",
            Self::Copied => "copied",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub path: PathBuf,
    pub mode: SyncMode,
    pub state: TargetState,
    /// Merge mode: links into the managed tree.
    pub linked: usize,
    /// Copy mode: entries recorded in the manifest.
    pub managed: usize,
    /// Entries the tool does not own.
    pub local: usize,
    /// Merge mode: links into the managed tree that no longer resolve.
    pub broken: usize,
}

impl TargetStatus {
    fn new(target: &TargetConfig, state: TargetState) -> Self {
        Self {
            name: target.name.clone(),
            path: target.path.clone(),
            mode: target.mode,
            state,
            linked: 0,
            managed: 0,
            local: 0,
            broken: 0,
        }
    }

    #[must_use]
    pub fn detail(&self) -> String {
        match self.state {
            TargetState::Merged => {
                let mut line = format!("{} linked, {} local", self.linked, self.local);
                if self.broken > 0 {
                    let _ = write!(line, ", {} broken", self.broken);
                }
                line
            }
            TargetState::Copied => format!("{} managed, {} local", self.managed, self.local),
            state => state.as_str().to_string(),
        }
    }
}

/// Inspect `target` against the managed tree at `source_root`.
#[must_use]
pub fn check_status(target: &TargetConfig, source_root: &Path) -> TargetStatus {
    let path = &target.path;
    if !entry_exists(path) {
        return TargetStatus::new(target, TargetState::NotExist);
    }
    match target.mode {
        SyncMode::Symlink => TargetStatus::new(target, symlink_state(path, source_root)),
        SyncMode::Merge => merge_status(target, source_root),
        SyncMode::Copy => copy_status(target),
    }
}

fn symlink_state(path: &Path, source_root: &Path) -> TargetState {
    if is_symlink(path) {
        return match read_link_absolute(path) {
            Some(dest) if same_location(&dest, source_root) => {
                if path.exists() {
                    TargetState::Linked
                } else {
                    TargetState::Broken
                }
            }
            _ => TargetState::Conflict,
        };
    }
    if !path.is_dir() {
        TargetState::Unknown
    } else if is_empty_dir(path) {
        TargetState::NotExist
    } else {
        TargetState::HasFiles
    }
}

fn merge_status(target: &TargetConfig, source_root: &Path) -> TargetStatus {
    let path = &target.path;
    if is_symlink(path) {
        return TargetStatus::new(target, TargetState::Conflict);
    }
    if !path.is_dir() {
        return TargetStatus::new(target, TargetState::Unknown);
    }

    let mut status = TargetStatus::new(target, TargetState::Merged);
    for (name, entry) in dir_entries(path) {
        if !is_symlink(&entry) {
            if !is_hidden(&name) {
                status.local += 1;
            }
            continue;
        }
        match read_link_absolute(&entry) {
            Some(dest) if is_within(&dest, source_root) => {
                if entry.exists() {
                    status.linked += 1;
                } else {
                    status.broken += 1;
                }
            }
            _ => status.local += 1,
        }
    }
    status
}

fn copy_status(target: &TargetConfig) -> TargetStatus {
    let path = &target.path;
    if is_symlink(path) {
        return TargetStatus::new(target, TargetState::Conflict);
    }
    if !path.is_dir() {
        return TargetStatus::new(target, TargetState::Unknown);
    }

    let manifest = Manifest::load(path);
    let mut status = TargetStatus::new(target, TargetState::Copied);
    status.managed = manifest.managed.len();
    status.local = dir_entries(path)
        .filter(|(name, entry)| !is_hidden(name) && entry.is_dir() && !manifest.contains(name))
        .count();
    status
}

/// Hidden names still count when they are links into the managed tree,
/// since skills under dot directories flatten to dot names.
fn dir_entries(dir: &Path) -> impl Iterator<Item = (String, PathBuf)> {
    std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(std::result::Result::ok)
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
}
