//! skillsync update - Reinstall skills from their recorded provenance.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_outcome};
use crate::error::{Result, SkillsyncError, StructuredError};
use crate::install::installer::{InstalledSkill, tracked_repos, updatable_skills};
use crate::install::{UpdateOptions, update_from_provenance};

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Skill directories, relative to the managed tree or absolute
    #[arg(value_name = "PATH")]
    pub paths: Vec<String>,

    /// Update every installed skill with a recorded source and every tracked repository
    #[arg(long, conflicts_with = "paths")]
    pub all: bool,

    /// Show what would be updated without writing
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct UpdateFailure {
    path: String,
    error: StructuredError,
}

#[derive(Debug, Default, Serialize)]
struct UpdateSummary {
    updated: Vec<InstalledSkill>,
    failures: Vec<UpdateFailure>,
}

pub fn run(ctx: &AppContext, args: &UpdateArgs) -> Result<()> {
    let paths = if args.all && !ctx.source_root.is_dir() {
        Vec::new()
    } else if args.all {
        let mut paths = updatable_skills(&ctx.source_root)?;
        paths.extend(tracked_repos(&ctx.source_root)?);
        paths
    } else if args.paths.is_empty() {
        return Err(SkillsyncError::ValidationFailed(
            "name skill paths to update, or pass --all".to_string(),
        ));
    } else {
        args.paths.clone()
    };

    let opts = UpdateOptions {
        dry_run: args.dry_run,
    };
    let mut summary = UpdateSummary::default();
    for path in &paths {
        let dir = resolve(&ctx.source_root, path);
        match update_from_provenance(&dir, &opts) {
            Ok(skill) => summary.updated.push(skill),
            Err(err) => summary.failures.push(UpdateFailure {
                path: path.clone(),
                error: err.to_structured(),
            }),
        }
    }

    let failed = summary.failures.len();
    if ctx.robot_mode {
        emit_robot(&robot_outcome(&summary, summary.updated.len(), failed))?;
    } else {
        emit_human(human_summary(&summary, args.dry_run));
    }

    if failed > 0 {
        return Err(SkillsyncError::PartialFailure {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    }
}

fn human_summary(summary: &UpdateSummary, dry_run: bool) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(if dry_run { "Update (dry run)" } else { "Update" });
    if summary.updated.is_empty() && summary.failures.is_empty() {
        layout.push_line("Nothing to update");
    }
    for skill in &summary.updated {
        layout.status(
            true,
            &skill.action.to_string(),
            &format!("{} ({})", skill.name, skill.dest.display()),
        );
    }
    for failure in &summary.failures {
        layout.status(false, "failed", &format!("{}: {}", failure.path, failure.error.message));
    }
    layout
}
