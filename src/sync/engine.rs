//! Target reconciliation.
//!
//! Each sync computes a full plan for the target before touching the
//! filesystem. Validation problems (bad filter patterns, flat-name
//! collisions) abort with no writes; per-skill conflicts and apply failures
//! are collected into the report and the remaining steps still run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SkillsyncError, StructuredError};
use crate::utils::fs::{
    copy_dir, create_dir_link, ensure_dir, entry_exists, is_empty_dir, is_symlink, is_within,
    read_link_absolute, remove_entry, same_location,
};

use super::config::{SyncMode, TargetConfig, validate_target_name};
use super::filter::select_for_target;
use super::flatten::{CoincidenceReport, check_flat_collisions, check_name_collisions};
use super::inventory::{SourceSkill, scan};
use super::manifest::{MANIFEST_FILE, Manifest, dir_fingerprint, is_entry_name};

/// Report label for the single entry of a symlink-mode target.
const ROOT_ENTRY: &str = ".";

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub force: bool,
}

/// A per-entry failure inside an otherwise valid sync.
#[derive(Debug, Clone, Serialize)]
pub struct SkillFailure {
    pub skill: String,
    pub error: StructuredError,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub target: String,
    pub path: PathBuf,
    pub mode: SyncMode,
    pub dry_run: bool,
    /// Links created or replaced.
    pub linked: Vec<String>,
    /// Copies created where nothing was present.
    pub copied: Vec<String>,
    /// Copies overwritten because content changed or `force` was set.
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub pruned: Vec<String>,
    /// Unmanaged entries left in place.
    pub preserved: Vec<String>,
    /// Skills dropped by the target's include/exclude filters.
    pub filtered: usize,
    pub manifest_removed: bool,
    pub errors: Vec<SkillFailure>,
    pub notices: Vec<String>,
    pub duration_ms: u128,
}

impl SyncReport {
    fn new(target: &TargetConfig, options: SyncOptions) -> Self {
        Self {
            target: target.name.clone(),
            path: target.path.clone(),
            mode: target.mode,
            dry_run: options.dry_run,
            ..Self::default()
        }
    }

    /// Whether the sync changed (or would change) nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.linked.is_empty()
            && self.copied.is_empty()
            && self.updated.is_empty()
            && self.pruned.is_empty()
            && !self.manifest_removed
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} ({}): +{} linked, +{} copied, ~{} updated, ={} unchanged, -{} pruned, !{} errors",
            self.target,
            self.mode,
            self.linked.len(),
            self.copied.len(),
            self.updated.len(),
            self.unchanged.len(),
            self.pruned.len(),
            self.errors.len()
        )
    }

    fn fail(&mut self, skill: &str, err: &SkillsyncError) {
        warn!(target_name = %self.target, skill, error = %err, "sync step failed");
        self.errors.push(SkillFailure {
            skill: skill.to_string(),
            error: err.to_structured(),
        });
    }
}

/// One planned mutation or observation inside a target.
#[derive(Debug)]
enum Step {
    Link {
        name: String,
        link: PathBuf,
        target: PathBuf,
        replace: bool,
    },
    Copy {
        name: String,
        src: PathBuf,
        dest: PathBuf,
        fingerprint: String,
        replace: bool,
    },
    Prune {
        name: String,
        path: PathBuf,
    },
    Unchanged(String),
    Preserve(String),
    Conflict {
        name: String,
        error: SkillsyncError,
    },
}

/// How the target path itself must change before per-entry steps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prepare {
    Ready,
    Create,
    Replace,
}

#[derive(Debug)]
struct Plan {
    prepare: Prepare,
    steps: Vec<Step>,
    manifest: Option<Manifest>,
    remove_manifest: bool,
}

impl Plan {
    const fn new(prepare: Prepare) -> Self {
        Self {
            prepare,
            steps: Vec::new(),
            manifest: None,
            remove_manifest: false,
        }
    }
}

/// Reconciles configured targets against a managed tree.
pub struct SyncEngine {
    source_root: PathBuf,
    targets: Vec<TargetConfig>,
}

impl SyncEngine {
    pub fn new(source_root: impl Into<PathBuf>, targets: Vec<TargetConfig>) -> Self {
        Self {
            source_root: source_root.into(),
            targets,
        }
    }

    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    #[must_use]
    pub fn targets(&self) -> &[TargetConfig] {
        &self.targets
    }

    /// Sync every configured target in declaration order.
    ///
    /// Every target is validated before the first one is written, so a bad
    /// filter or a flat-name collision anywhere aborts the run with no
    /// writes at all.
    pub fn sync_all(&self, options: SyncOptions) -> Result<Vec<SyncReport>> {
        let skills = scan(&self.source_root)?;
        let selections = self
            .targets
            .iter()
            .map(|target| select_validated(target, &skills))
            .collect::<Result<Vec<_>>>()?;
        let coincidences = check_name_collisions(&skills, &self.targets)?;
        for coincidence in &coincidences.global {
            debug!(name = %coincidence.name, paths = ?coincidence.paths, "front matter name shared");
        }

        let mut reports = Vec::with_capacity(self.targets.len());
        for (target, eligible) in self.targets.iter().zip(&selections) {
            let mut report = self.sync_with(target, skills.len(), eligible, options);
            attach_notices(&mut report, &coincidences, &target.name);
            reports.push(report);
        }
        Ok(reports)
    }

    /// Sync one target by name.
    pub fn sync_target(&self, name: &str, options: SyncOptions) -> Result<SyncReport> {
        validate_target_name(name)?;
        let target = self
            .targets
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| SkillsyncError::Config(format!("unknown target: {name}")))?;
        let skills = scan(&self.source_root)?;
        let eligible = select_validated(target, &skills)?;
        let coincidences = check_name_collisions(&skills, std::slice::from_ref(target))?;

        let mut report = self.sync_with(target, skills.len(), &eligible, options);
        attach_notices(&mut report, &coincidences, name);
        Ok(report)
    }

    fn sync_with(
        &self,
        target: &TargetConfig,
        total: usize,
        eligible: &[&SourceSkill],
        options: SyncOptions,
    ) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::new(target, options);

        let plan = match target.mode {
            SyncMode::Symlink => self.plan_symlink(target, options.force),
            SyncMode::Merge => {
                report.filtered = total - eligible.len();
                self.plan_merge(target, eligible, options.force)
            }
            SyncMode::Copy => {
                report.filtered = total - eligible.len();
                self.plan_copy(target, eligible, options.force)
            }
        };

        apply(plan, target, &mut report, options.dry_run);

        report.duration_ms = start.elapsed().as_millis();
        info!(
            target_name = %target.name,
            mode = %target.mode,
            dry_run = options.dry_run,
            "{}",
            report.summary_line()
        );
        report
    }

    fn plan_symlink(&self, target: &TargetConfig, force: bool) -> Plan {
        let mut plan = Plan::new(Prepare::Ready);
        let path = &target.path;
        let mut replace = false;

        if entry_exists(path) {
            if is_symlink(path) {
                if read_link_absolute(path)
                    .is_some_and(|dest| same_location(&dest, &self.source_root))
                {
                    plan.steps.push(Step::Unchanged(ROOT_ENTRY.to_string()));
                    return plan;
                }
                if !force {
                    plan.steps.push(conflict(ROOT_ENTRY, path, "link points elsewhere"));
                    return plan;
                }
            } else if path.is_dir() && is_empty_dir(path) {
                debug!(path = %path.display(), "replacing empty directory with link");
            } else if !force {
                let reason = if path.is_dir() {
                    "directory has files"
                } else {
                    "path is a file"
                };
                plan.steps.push(conflict(ROOT_ENTRY, path, reason));
                return plan;
            }
            replace = true;
        }

        plan.steps.push(Step::Link {
            name: ROOT_ENTRY.to_string(),
            link: path.clone(),
            target: self.source_root.clone(),
            replace,
        });
        plan
    }

    fn plan_merge(&self, target: &TargetConfig, eligible: &[&SourceSkill], force: bool) -> Plan {
        let Some(mut plan) = prepare_dir(target, force) else {
            return target_conflict(target);
        };
        let dir = &target.path;
        let fresh = plan.prepare != Prepare::Ready;

        for skill in eligible {
            let link = dir.join(&skill.flat_name);
            let step = if fresh || !entry_exists(&link) {
                Step::Link {
                    name: skill.flat_name.clone(),
                    link,
                    target: skill.path.clone(),
                    replace: false,
                }
            } else if is_symlink(&link) {
                if read_link_absolute(&link).is_some_and(|dest| same_location(&dest, &skill.path)) {
                    Step::Unchanged(skill.flat_name.clone())
                } else if force {
                    Step::Link {
                        name: skill.flat_name.clone(),
                        link,
                        target: skill.path.clone(),
                        replace: true,
                    }
                } else {
                    conflict(&skill.flat_name, &link, "link points elsewhere")
                }
            } else if force {
                Step::Link {
                    name: skill.flat_name.clone(),
                    link,
                    target: skill.path.clone(),
                    replace: true,
                }
            } else {
                conflict(&skill.flat_name, &link, "real directory in the way")
            };
            plan.steps.push(step);
        }

        let desired: BTreeSet<&str> = eligible.iter().map(|s| s.flat_name.as_str()).collect();
        if plan.prepare == Prepare::Ready {
            plan.steps
                .extend(stale_links(dir, &self.source_root, &desired));

            if Manifest::exists(dir) {
                // Copies left behind by copy mode are still ours to remove.
                let manifest = Manifest::load(dir);
                for name in manifest.managed.keys() {
                    let path = dir.join(name);
                    if !desired.contains(name.as_str()) && entry_exists(&path) && !is_symlink(&path)
                    {
                        plan.steps.extend(manifest_prune(dir, name));
                    }
                }
                plan.remove_manifest = true;
            }
        }
        plan
    }

    fn plan_copy(&self, target: &TargetConfig, eligible: &[&SourceSkill], force: bool) -> Plan {
        let Some(mut plan) = prepare_dir(target, force) else {
            return target_conflict(target);
        };
        let dir = &target.path;
        let fresh = plan.prepare != Prepare::Ready;
        let manifest = if fresh {
            Manifest::default()
        } else {
            Manifest::load(dir)
        };

        for skill in eligible {
            let name = skill.flat_name.clone();
            let dest = dir.join(&name);
            let fingerprint = match dir_fingerprint(&skill.path) {
                Ok(fingerprint) => fingerprint,
                Err(err) => {
                    plan.steps.push(Step::Conflict { name, error: err });
                    continue;
                }
            };
            let copy = |replace: bool| Step::Copy {
                name: name.clone(),
                src: skill.path.clone(),
                dest: dest.clone(),
                fingerprint: fingerprint.clone(),
                replace,
            };

            let step = if fresh || !entry_exists(&dest) {
                copy(false)
            } else if is_symlink(&dest) {
                if force {
                    copy(true)
                } else {
                    conflict(&name, &dest, "link in the way of a copy")
                }
            } else if let Some(entry) = manifest.get(&name) {
                if entry.fingerprint == fingerprint && !force {
                    Step::Unchanged(name.clone())
                } else {
                    copy(true)
                }
            } else if force {
                copy(true)
            } else {
                Step::Preserve(name.clone())
            };
            plan.steps.push(step);
        }

        let desired: BTreeSet<&str> = eligible.iter().map(|s| s.flat_name.as_str()).collect();
        for name in manifest.managed.keys() {
            if !desired.contains(name.as_str()) {
                plan.steps.extend(manifest_prune(dir, name));
            }
        }
        if plan.prepare == Prepare::Ready {
            plan.steps
                .extend(stale_links(dir, &self.source_root, &desired));
        }

        plan.manifest = Some(manifest);
        plan
    }
}

fn conflict(name: &str, path: &Path, reason: &str) -> Step {
    Step::Conflict {
        name: name.to_string(),
        error: SkillsyncError::LinkConflict {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        },
    }
}

fn target_conflict(target: &TargetConfig) -> Plan {
    let reason = if is_symlink(&target.path) {
        "target is a link; use --force to convert it to a directory"
    } else {
        "target is not a directory"
    };
    let mut plan = Plan::new(Prepare::Ready);
    plan.steps.push(conflict(&target.name, &target.path, reason));
    plan
}

/// Skills a target receives, after checking its filters compile and the
/// survivors have distinct flat names. Symlink targets mirror the whole tree.
fn select_validated<'a>(
    target: &TargetConfig,
    skills: &'a [SourceSkill],
) -> Result<Vec<&'a SourceSkill>> {
    if !target.mode.is_per_skill() {
        return Ok(Vec::new());
    }
    let eligible = select_for_target(target, skills)
        .and_then(|eligible| check_flat_collisions(eligible.iter().copied()).map(|()| eligible));
    if let Err(err) = &eligible {
        warn!(target_name = %target.name, error = %err, "target failed validation; nothing written");
    }
    eligible
}

fn attach_notices(report: &mut SyncReport, coincidences: &CoincidenceReport, target: &str) {
    if let Some(found) = coincidences.per_target.get(target) {
        for coincidence in found {
            warn!(target_name = %target, "{}", coincidence.message());
            report.notices.push(coincidence.message());
        }
    }
}

/// Prune step for a manifest-recorded copy, refusing anything that does
/// not resolve to a plain entry of `dir`.
fn manifest_prune(dir: &Path, name: &str) -> Option<Step> {
    let path = dir.join(name);
    if !is_entry_name(name) || !is_within(&path, dir) {
        warn!(dir = %dir.display(), entry = %name, "refusing to prune manifest entry outside the target");
        return None;
    }
    Some(Step::Prune {
        name: name.to_string(),
        path,
    })
}

/// Decide how a merge or copy target directory must be prepared.
///
/// `None` means the path is occupied by something that needs `force`.
fn prepare_dir(target: &TargetConfig, force: bool) -> Option<Plan> {
    let path = &target.path;
    if !entry_exists(path) {
        return Some(Plan::new(Prepare::Create));
    }
    if is_symlink(path) || !path.is_dir() {
        return force.then(|| Plan::new(Prepare::Replace));
    }
    Some(Plan::new(Prepare::Ready))
}

/// Links in `dir` that point into the managed tree but are not desired.
fn stale_links(dir: &Path, source_root: &Path, desired: &BTreeSet<&str>) -> Vec<Step> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut stale: Vec<Step> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if name == MANIFEST_FILE || desired.contains(name.as_str()) || !is_symlink(&path) {
                return None;
            }
            let dest = read_link_absolute(&path)?;
            is_within(&dest, source_root).then_some(Step::Prune { name, path })
        })
        .collect();
    stale.sort_by(|a, b| step_name(a).cmp(step_name(b)));
    stale
}

fn step_name(step: &Step) -> &str {
    match step {
        Step::Link { name, .. }
        | Step::Copy { name, .. }
        | Step::Prune { name, .. }
        | Step::Conflict { name, .. } => name,
        Step::Unchanged(name) | Step::Preserve(name) => name,
    }
}

fn apply(plan: Plan, target: &TargetConfig, report: &mut SyncReport, dry_run: bool) {
    let Plan {
        prepare,
        steps,
        mut manifest,
        remove_manifest,
    } = plan;
    let dir = &target.path;

    if !dry_run && prepare != Prepare::Ready {
        let prepared = if prepare == Prepare::Replace {
            remove_entry(dir).and_then(|()| ensure_dir(dir))
        } else {
            ensure_dir(dir)
        };
        if let Err(err) = prepared {
            report.fail(&target.name, &err);
            return;
        }
    }

    let mut manifest_dirty = manifest.is_some() && !Manifest::exists(dir);
    for step in steps {
        match step {
            Step::Unchanged(name) => report.unchanged.push(name),
            Step::Preserve(name) => {
                report.notices.push(format!(
                    "{name}: unmanaged directory left in place (use --force to overwrite)"
                ));
                report.preserved.push(name);
            }
            Step::Conflict { name, error } => report.fail(&name, &error),
            Step::Link {
                name,
                link,
                target: dest,
                replace,
            } => {
                let result = if dry_run {
                    Ok(())
                } else {
                    replace_with(&link, replace, |path| create_dir_link(&dest, path))
                };
                match result {
                    Ok(()) => {
                        debug!(link = %link.display(), dest = %dest.display(), dry_run, "linked");
                        report.linked.push(name);
                    }
                    Err(err) => report.fail(&name, &err),
                }
            }
            Step::Copy {
                name,
                src,
                dest,
                fingerprint,
                replace,
            } => {
                let result = if dry_run {
                    Ok(())
                } else {
                    replace_with(&dest, replace, |path| copy_dir(&src, path, &[]).map(|_| ()))
                };
                match result {
                    Ok(()) => {
                        if let Some(manifest) = manifest.as_mut() {
                            manifest.record(&name, fingerprint);
                            manifest_dirty = true;
                        }
                        if replace {
                            report.updated.push(name);
                        } else {
                            report.copied.push(name);
                        }
                    }
                    Err(err) => report.fail(&name, &err),
                }
            }
            Step::Prune { name, path } => {
                let result = if dry_run || !entry_exists(&path) {
                    Ok(())
                } else {
                    remove_entry(&path)
                };
                match result {
                    Ok(()) => {
                        if let Some(manifest) = manifest.as_mut() {
                            manifest_dirty |= manifest.forget(&name);
                        }
                        debug!(path = %path.display(), dry_run, "pruned");
                        report.pruned.push(name);
                    }
                    Err(err) => report.fail(&name, &err),
                }
            }
        }
    }

    if remove_manifest && report.errors.is_empty() {
        if dry_run {
            report.manifest_removed = Manifest::exists(dir);
        } else {
            match Manifest::remove(dir) {
                Ok(removed) => report.manifest_removed = removed,
                Err(err) => report.fail(&target.name, &err),
            }
        }
    }

    if let Some(mut manifest) = manifest.filter(|_| manifest_dirty && !dry_run) {
        if let Err(err) = manifest.save(dir) {
            report.fail(&target.name, &err);
        }
    }
}

/// Put a fresh entry at `path`, clearing what is there first when `replace`.
fn replace_with(path: &Path, replace: bool, create: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    if replace && entry_exists(path) {
        remove_entry(path)?;
    }
    create(path)
}
