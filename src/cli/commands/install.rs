//! skillsync install - Install skills from a path, git URL, or repo shorthand.

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok, robot_outcome};
use crate::error::{Result, SkillsyncError};
use crate::install::installer::install_tracked;
use crate::install::source::{self, SourceDescriptor};
use crate::install::{Discovery, InstallOptions, InstallReport, SkillInfo, discover, install};

#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Skill source (local path, git URL, or owner/repo[/path])
    pub source: String,

    /// Install under this name (single-skill sources only)
    #[arg(long)]
    pub name: Option<String>,

    /// Install under a subgroup directory of the managed tree
    #[arg(long, value_name = "GROUP")]
    pub into: Option<String>,

    /// Overwrite existing skills
    #[arg(long, short = 'f', conflicts_with = "update")]
    pub force: bool,

    /// Reinstall existing skills from their recorded source
    #[arg(long, short = 'u')]
    pub update: bool,

    /// Show what would be installed without writing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Skills to install by name (defaults to all)
    #[arg(long, short = 's', value_delimiter = ',')]
    pub skill: Vec<String>,

    /// Glob patterns of skill names to leave out
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// List the skills the source provides and exit
    #[arg(long, conflicts_with_all = ["track", "dry_run"])]
    pub list: bool,

    /// Clone the whole repository as a tracked `_<name>` working copy
    #[arg(long, conflicts_with_all = ["skill", "exclude"])]
    pub track: bool,
}

#[derive(Serialize)]
struct DiscoveredListing<'a> {
    source: &'a SourceDescriptor,
    commit: Option<&'a str>,
    skills: &'a [SkillInfo],
}

pub fn run(ctx: &AppContext, args: &InstallArgs) -> Result<()> {
    let descriptor = source::parse(&args.source)?;
    let opts = InstallOptions {
        force: args.force,
        update: args.update,
        dry_run: args.dry_run,
        name: args.name.clone(),
        into: args.into.clone().or_else(|| ctx.config.install.into.clone()),
        exclude: args.exclude.clone(),
    };

    if args.track {
        return track(ctx, &descriptor, &opts);
    }

    let discovery = discover(&descriptor)?;
    let result = install_discovered(ctx, &discovery, args, &opts);
    discovery.release()?;
    result
}

fn install_discovered(
    ctx: &AppContext,
    discovery: &Discovery,
    args: &InstallArgs,
    opts: &InstallOptions,
) -> Result<()> {
    if args.list {
        return list_discovered(ctx, discovery);
    }
    if discovery.skills.is_empty() {
        return Err(SkillsyncError::InvalidSource {
            input: discovery.source.raw_input.clone(),
            reason: "no SKILL.md found".to_string(),
        });
    }

    let selected = discovery.select(&args.skill)?;
    let report = install(discovery, &selected, &ctx.source_root, opts)?;
    let failed = report.failures.len();
    let total = failed + report.installed.len();

    if ctx.robot_mode {
        let response = robot_outcome(&report, report.installed.len(), failed)
            .with_warnings(report.warnings.clone());
        emit_robot(&response)?;
    } else {
        emit_human(human_report(&report));
    }

    if failed > 0 {
        return Err(SkillsyncError::PartialFailure { failed, total });
    }
    Ok(())
}

fn human_report(report: &InstallReport) -> HumanLayout {
    let mut layout = HumanLayout::new();
    let title = if report.dry_run {
        "Install (dry run)"
    } else {
        "Install"
    };
    layout
        .title(title)
        .kv("Source", &report.source)
        .kv("Destination", &report.dest_root.display().to_string())
        .blank();

    for skill in &report.installed {
        let text = if skill.license.is_empty() {
            format!("{} -> {}", skill.name, skill.dest.display())
        } else {
            format!("{} -> {} ({})", skill.name, skill.dest.display(), skill.license)
        };
        layout.status(true, &skill.action.to_string(), &text);
    }
    for failure in &report.failures {
        layout.status(false, "failed", &format!("{}: {}", failure.skill, failure.error.message));
    }
    if !report.excluded.is_empty() {
        layout.kv("Excluded", &report.excluded.len().to_string());
    }
    for warning in &report.warnings {
        layout.bullet(&format!("warning: {warning}"));
    }
    layout.blank().push_line(report.summary_line());
    layout
}

fn list_discovered(ctx: &AppContext, discovery: &Discovery) -> Result<()> {
    if ctx.robot_mode {
        return emit_robot(&robot_ok(DiscoveredListing {
            source: &discovery.source,
            commit: discovery.commit.as_deref(),
            skills: &discovery.skills,
        }));
    }

    let mut layout = HumanLayout::new();
    layout
        .title(&format!("Skills in {}", discovery.source.raw_input))
        .kv("Found", &discovery.skills.len().to_string());
    if let Some(commit) = &discovery.commit {
        layout.kv("Commit", commit);
    }
    layout.blank();
    for skill in &discovery.skills {
        let mut line = format!("{} ({})", skill.name, skill.relative_path);
        if !skill.license.is_empty() {
            line.push_str(&format!(" [{}]", skill.license));
        }
        layout.bullet(&line);
    }
    emit_human(layout);
    Ok(())
}

fn track(ctx: &AppContext, descriptor: &SourceDescriptor, opts: &InstallOptions) -> Result<()> {
    let report = install_tracked(descriptor, &ctx.source_root, opts)?;
    if ctx.robot_mode {
        return emit_robot(&robot_ok(&report).with_warnings(report.warnings.clone()));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Tracked repository")
        .kv("Name", &report.name)
        .kv("Path", &report.path.display().to_string())
        .kv("Action", &report.action.to_string())
        .kv("Skills", &report.skills.len().to_string());
    for skill in &report.skills {
        layout.bullet(skill);
    }
    for warning in &report.warnings {
        layout.bullet(&format!("warning: {warning}"));
    }
    emit_human(layout);
    Ok(())
}
