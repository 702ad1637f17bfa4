//! Skill installation into the managed tree.
//!
//! Materializes discovered skills, nesting children under an orchestrator
//! root when one is selected, and records provenance for later updates.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, SkillsyncError, StructuredError};
use crate::skill_md::has_skill_file;
use crate::sync::filter::compile_patterns;
use crate::utils::fs::{
    GIT_DIR, copy_dir, ensure_dir, entry_exists, is_symlink, move_dir, remove_entry,
    slash_relative,
};
use crate::utils::git::{self, PullOutcome};

use super::discover::{Discovery, SkillInfo, discover, discover_skills};
use super::gitignore;
use super::meta::{META_FILE, SkillMeta, read_meta, write_meta};
use super::source::{self, SourceDescriptor};

/// Directory-name prefix marking a tracked repository.
pub const TRACKED_PREFIX: char = '_';

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    pub force: bool,
    pub update: bool,
    pub dry_run: bool,
    /// Custom name; only valid when discovery yields one skill.
    pub name: Option<String>,
    /// Subgroup path under the destination root.
    pub into: Option<String>,
    /// Globs matched against discovered names.
    pub exclude: Vec<String>,
}

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallAction {
    Installed,
    Updated,
    Reinstalled,
    WouldInstall,
    WouldUpdate,
    WouldReinstall,
}

impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Installed => "installed",
            Self::Updated => "updated",
            Self::Reinstalled => "reinstalled",
            Self::WouldInstall => "would install",
            Self::WouldUpdate => "would update",
            Self::WouldReinstall => "would reinstall",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstalledSkill {
    pub name: String,
    /// Path within the source, `"."` for the root.
    pub source_path: String,
    pub dest: PathBuf,
    pub action: InstallAction,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub license: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallFailure {
    pub skill: String,
    pub error: StructuredError,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub source: String,
    pub dest_root: PathBuf,
    pub dry_run: bool,
    pub installed: Vec<InstalledSkill>,
    pub excluded: Vec<String>,
    pub failures: Vec<InstallFailure>,
    pub warnings: Vec<String>,
    pub duration_ms: u128,
}

impl InstallReport {
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} {}, {} excluded, {} failed",
            self.source,
            self.installed.len(),
            if self.dry_run { "planned" } else { "done" },
            self.excluded.len(),
            self.failures.len()
        )
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One entry after validation, with its final name and destination.
#[derive(Debug)]
struct PlannedEntry<'a> {
    skill: &'a SkillInfo,
    name: String,
    dest: PathBuf,
}

/// Install `selected` skills from `discovery` under `dest_root`.
///
/// All validation happens before the first write. Failures of individual
/// entries are collected in the report; the root entry is installed first.
pub fn install(
    discovery: &Discovery,
    selected: &[SkillInfo],
    dest_root: &Path,
    opts: &InstallOptions,
) -> Result<InstallReport> {
    let start = Instant::now();
    let mut report = InstallReport {
        source: discovery.source.raw_input.clone(),
        dest_root: dest_root.to_path_buf(),
        dry_run: opts.dry_run,
        ..InstallReport::default()
    };

    let roots = selected.iter().filter(|s| s.is_root()).count();
    if roots > 1 {
        return Err(SkillsyncError::ValidationFailed(format!(
            "selection contains {roots} root entries; at most one is allowed"
        )));
    }
    if let Some(name) = &opts.name {
        if discovery.skills.len() != 1 {
            return Err(SkillsyncError::NameNotApplicable {
                found: discovery.skills.len(),
            });
        }
        validate_skill_name(name)?;
    }
    let base = match &opts.into {
        Some(into) => dest_root.join(validate_subgroup(into)?.join("/")),
        None => dest_root.to_path_buf(),
    };

    let mut entries: Vec<&SkillInfo> = selected.iter().collect();
    if !opts.exclude.is_empty() {
        if discovery.is_multi() {
            let patterns = compile_patterns(&opts.exclude)?;
            entries.retain(|skill| {
                let hit = patterns.iter().any(|p| p.matches(&skill.name));
                if hit {
                    report.excluded.push(skill.name.clone());
                }
                !hit
            });
        } else {
            let msg = "--exclude ignored: source provides a single skill".to_string();
            warn!("{msg}");
            report.warnings.push(msg);
        }
    }
    entries.sort_by_key(|skill| !skill.is_root());

    let plan = plan_entries(&entries, &base, opts.name.as_deref())?;
    let skip = child_subtrees(discovery);

    for entry in &plan {
        match install_entry(discovery, entry, &skip, opts) {
            Ok(installed) => {
                info!(
                    skill = %installed.name,
                    dest = %installed.dest.display(),
                    action = %installed.action,
                    "install entry"
                );
                report.installed.push(installed);
            }
            Err(err) => {
                warn!(skill = %entry.name, error = %err, "install entry failed");
                report.failures.push(InstallFailure {
                    skill: entry.name.clone(),
                    error: err.to_structured(),
                });
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis();
    Ok(report)
}

fn plan_entries<'a>(
    entries: &[&'a SkillInfo],
    base: &Path,
    custom_name: Option<&str>,
) -> Result<Vec<PlannedEntry<'a>>> {
    let root_dest = match entries.iter().find(|s| s.is_root()) {
        Some(root) => {
            let name = custom_name.unwrap_or(&root.name).to_string();
            validate_skill_name(&name)?;
            Some(base.join(name))
        }
        None => None,
    };

    let planned = entries
        .iter()
        .map(|&skill| {
            let name = custom_name.unwrap_or(&skill.name).to_string();
            validate_skill_name(&name)?;
            let dest = match (&root_dest, skill.is_root()) {
                (Some(root), true) => root.clone(),
                (Some(root), false) => root.join(&name),
                (None, _) => base.join(&name),
            };
            Ok(PlannedEntry { skill, name, dest })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut claimed: HashMap<&Path, &str> = HashMap::new();
    for entry in &planned {
        if let Some(first) = claimed.insert(&entry.dest, &entry.skill.relative_path) {
            return Err(SkillsyncError::ValidationFailed(format!(
                "skills {first} and {} would both install to {}",
                entry.skill.relative_path,
                entry.dest.display()
            )));
        }
    }
    Ok(planned)
}

/// Absolute paths of every discovered child skill; never copied as part
/// of the root entry.
fn child_subtrees(discovery: &Discovery) -> Vec<PathBuf> {
    discovery
        .skills
        .iter()
        .filter(|s| !s.is_root())
        .map(|s| discovery.skill_path(s))
        .collect()
}

fn install_entry(
    discovery: &Discovery,
    entry: &PlannedEntry<'_>,
    skip: &[PathBuf],
    opts: &InstallOptions,
) -> Result<InstalledSkill> {
    let src = discovery.skill_path(entry.skill);
    let skip: &[PathBuf] = if entry.skill.is_root() { skip } else { &[] };
    let make_meta = || {
        let mut meta = SkillMeta::new(
            &discovery.source,
            discovery.provenance_for(entry.skill),
            discovery.repo_subdir_for(entry.skill),
        );
        meta.version.clone_from(&discovery.commit);
        meta
    };

    let action = if entry_exists(&entry.dest) {
        if opts.update {
            if git::is_repo(&entry.dest) {
                pull_in_place(&entry.dest, opts.dry_run)?
            } else if read_meta(&entry.dest)?.is_none() {
                return Err(SkillsyncError::NoProvenanceForUpdate {
                    path: entry.dest.clone(),
                });
            } else if opts.dry_run {
                InstallAction::WouldReinstall
            } else {
                swap_in(&src, &entry.dest, skip, &make_meta())?;
                InstallAction::Reinstalled
            }
        } else if !opts.force {
            return Err(SkillsyncError::AlreadyExists {
                path: entry.dest.clone(),
            });
        } else if opts.dry_run {
            InstallAction::WouldInstall
        } else {
            remove_entry(&entry.dest)?;
            materialize(&src, &entry.dest, skip, &make_meta())?;
            InstallAction::Installed
        }
    } else if opts.dry_run {
        InstallAction::WouldInstall
    } else {
        materialize(&src, &entry.dest, skip, &make_meta())?;
        InstallAction::Installed
    };

    Ok(InstalledSkill {
        name: entry.name.clone(),
        source_path: entry.skill.relative_path.clone(),
        dest: entry.dest.clone(),
        action,
        license: entry.skill.license.clone(),
    })
}

fn materialize(src: &Path, dest: &Path, skip: &[PathBuf], meta: &SkillMeta) -> Result<()> {
    let files = copy_dir(src, dest, skip)?;
    debug!(src = %src.display(), dest = %dest.display(), files, "copied skill");
    write_meta(dest, meta)
}

/// Reinstall by copying into a temp directory and swapping it into place,
/// so a failed copy leaves the previous install untouched. Nested skills
/// installed beneath the old copy are carried over.
fn swap_in(src: &Path, dest: &Path, skip: &[PathBuf], meta: &SkillMeta) -> Result<()> {
    let staging = TempDir::with_prefix("skillsync-update-")?;
    let fresh = staging.path().join("skill");
    materialize(src, &fresh, skip, meta)?;
    carry_nested_skills(dest, &fresh)?;

    remove_entry(dest)?;
    move_dir(&fresh, dest)?;
    staging.close()?;
    Ok(())
}

fn carry_nested_skills(old: &Path, fresh: &Path) -> Result<()> {
    for entry in std::fs::read_dir(old)? {
        let entry = entry?;
        let path = entry.path();
        if is_symlink(&path) || !path.is_dir() {
            continue;
        }
        let target = fresh.join(entry.file_name());
        if target.exists() {
            continue;
        }
        if has_skill_file(&path) || path.join(META_FILE).is_file() || git::is_repo(&path) {
            debug!(path = %path.display(), "carrying nested skill across reinstall");
            move_dir(&path, &target)?;
        }
    }
    Ok(())
}

fn pull_in_place(dest: &Path, dry_run: bool) -> Result<InstallAction> {
    if dry_run {
        git::open(dest)?;
        return Ok(InstallAction::WouldUpdate);
    }
    let outcome = git::pull_fast_forward(dest)?;
    if let PullOutcome::FastForwarded { to, .. } = &outcome {
        if let Some(mut meta) = read_meta(dest)? {
            meta.version = Some(to.clone());
            write_meta(dest, &meta)?;
        }
    }
    debug!(dest = %dest.display(), ?outcome, "pulled");
    Ok(InstallAction::Updated)
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub dry_run: bool,
}

/// Update an installed skill from its recorded provenance.
///
/// Working copies are pulled; everything else is re-resolved, re-discovered
/// and reinstalled through a temp-then-swap copy.
pub fn update_from_provenance(skill_dir: &Path, opts: &UpdateOptions) -> Result<InstalledSkill> {
    let name = skill_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if git::is_repo(skill_dir) {
        let action = pull_in_place(skill_dir, opts.dry_run)?;
        return Ok(InstalledSkill {
            name,
            source_path: ".".to_string(),
            dest: skill_dir.to_path_buf(),
            action,
            license: String::new(),
        });
    }

    let Some(meta) = read_meta(skill_dir)? else {
        return Err(SkillsyncError::NoProvenanceForUpdate {
            path: skill_dir.to_path_buf(),
        });
    };
    let descriptor = source::parse(&meta.source)?;
    let discovery = discover(&descriptor)?;
    let result = reinstall_root(&discovery, skill_dir, &name, opts);
    discovery.release()?;
    result
}

fn reinstall_root(
    discovery: &Discovery,
    skill_dir: &Path,
    name: &str,
    opts: &UpdateOptions,
) -> Result<InstalledSkill> {
    let Some(root) = discovery.root_skill() else {
        return Err(SkillsyncError::SkillNotFound {
            name: discovery.source.resolved_name.clone(),
            available: discovery.names(),
        });
    };

    let action = if opts.dry_run {
        InstallAction::WouldReinstall
    } else {
        let mut meta = SkillMeta::new(
            &discovery.source,
            discovery.provenance_for(root),
            discovery.repo_subdir_for(root),
        );
        meta.version.clone_from(&discovery.commit);
        swap_in(
            &discovery.skill_path(root),
            skill_dir,
            &child_subtrees(discovery),
            &meta,
        )?;
        InstallAction::Reinstalled
    };

    Ok(InstalledSkill {
        name: name.to_string(),
        source_path: root.relative_path.clone(),
        dest: skill_dir.to_path_buf(),
        action,
        license: root.license.clone(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedRepoReport {
    pub name: String,
    pub path: PathBuf,
    pub action: InstallAction,
    pub skills: Vec<String>,
    pub warnings: Vec<String>,
}

/// Clone `source` as a tracked repository `_<name>` that keeps its history.
pub fn install_tracked(
    source: &SourceDescriptor,
    dest_root: &Path,
    opts: &InstallOptions,
) -> Result<TrackedRepoReport> {
    let Some(url) = source.clone_url.as_deref() else {
        return Err(SkillsyncError::InvalidSource {
            input: source.raw_input.clone(),
            reason: "--track requires a git repository source".to_string(),
        });
    };

    let base_name = opts.name.as_deref().unwrap_or(&source.resolved_name);
    let tracked = if base_name.starts_with(TRACKED_PREFIX) {
        base_name.to_string()
    } else {
        format!("{TRACKED_PREFIX}{base_name}")
    };
    validate_skill_name(&tracked)?;

    let mut rel_segments = match &opts.into {
        Some(into) => validate_subgroup(into)?,
        None => Vec::new(),
    };
    rel_segments.push(tracked.clone());
    let rel = rel_segments.join("/");
    let dest = dest_root.join(&rel);

    let mut report = TrackedRepoReport {
        name: tracked,
        path: dest.clone(),
        action: InstallAction::WouldInstall,
        skills: Vec::new(),
        warnings: Vec::new(),
    };

    if entry_exists(&dest) {
        if opts.update {
            report.action = pull_in_place(&dest, opts.dry_run)?;
            report.skills = tracked_skill_names(&dest);
            return Ok(report);
        }
        if !opts.force {
            return Err(SkillsyncError::AlreadyExists { path: dest });
        }
        if !opts.dry_run {
            remove_entry(&dest)?;
        }
    }
    if opts.dry_run {
        return Ok(report);
    }

    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    git::clone(url, &dest, false)?;
    report.action = InstallAction::Installed;
    report.skills = tracked_skill_names(&dest);
    if report.skills.is_empty() {
        report
            .warnings
            .push("no SKILL.md files found in repository".to_string());
    }
    if let Err(err) = gitignore::add_entry(dest_root, &rel) {
        report
            .warnings
            .push(format!("failed to update .gitignore: {err}"));
    }
    info!(repo = %report.name, skills = report.skills.len(), "tracked repository installed");
    Ok(report)
}

fn tracked_skill_names(repo: &Path) -> Vec<String> {
    discover_skills(repo, "")
        .into_iter()
        .filter(|s| !s.is_root())
        .map(|s| s.name)
        .collect()
}

/// Relative paths of installed skills whose metadata names a source.
/// Tracked repositories are skipped.
pub fn updatable_skills(root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && (e.file_name() == GIT_DIR
                        || e.file_name().to_string_lossy().starts_with(TRACKED_PREFIX)))
        });
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        match read_meta(entry.path()) {
            Ok(Some(meta)) if !meta.source.is_empty() => {
                if let Some(rel) = slash_relative(root, entry.path()) {
                    found.push(rel);
                }
            }
            Ok(_) => {}
            Err(err) => warn!(path = %entry.path().display(), error = %err, "unreadable metadata"),
        }
    }
    Ok(found)
}

/// Relative paths of tracked repositories (`_`-prefixed git working copies).
pub fn tracked_repos(root: &Path) -> Result<Vec<String>> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            continue;
        }
        if entry.file_name() == GIT_DIR {
            walker.skip_current_dir();
            continue;
        }
        let is_tracked = entry.file_name().to_string_lossy().starts_with(TRACKED_PREFIX)
            && git::is_repo(entry.path());
        if is_tracked {
            if let Some(rel) = slash_relative(root, entry.path()) {
                found.push(rel);
            }
            walker.skip_current_dir();
        }
    }
    Ok(found)
}

/// Reject names that cannot be a single directory entry.
pub fn validate_skill_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name cannot be empty")
    } else if name.starts_with('-') {
        Some("name cannot start with '-'")
    } else if name.contains(['/', '\\']) {
        Some("name cannot contain path separators")
    } else if name == "." || name == ".." {
        Some("name cannot be '.' or '..'")
    } else if name.contains('\0') {
        Some("name cannot contain NUL")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SkillsyncError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Split a `--into` path into validated segments.
pub fn validate_subgroup(into: &str) -> Result<Vec<String>> {
    let invalid = |segment: &str| SkillsyncError::InvalidSubgroupSegment {
        path: into.to_string(),
        segment: segment.to_string(),
    };
    if into.starts_with(['/', '\\']) || Path::new(into).is_absolute() {
        return Err(invalid(into));
    }
    let trimmed = into.strip_suffix(['/', '\\']).unwrap_or(into);
    if trimmed.is_empty() {
        return Err(invalid(""));
    }
    trimmed
        .split(['/', '\\'])
        .map(|segment| match segment {
            "" | "." | ".." => Err(invalid(segment)),
            s => Ok(s.to_string()),
        })
        .collect()
}
