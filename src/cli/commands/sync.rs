//! skillsync sync - Reconcile targets with the managed tree.

use clap::Args;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_outcome};
use crate::error::{Result, SkillsyncError};
use crate::sync::{SyncOptions, SyncReport};

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Specific target name (default: all configured targets)
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Preview sync operations without writing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Replace conflicting links and directories
    #[arg(long, short = 'f')]
    pub force: bool,
}

pub fn run(ctx: &AppContext, args: &SyncArgs) -> Result<()> {
    let engine = ctx.sync_engine();
    if engine.targets().is_empty() {
        return Err(SkillsyncError::MissingConfig(
            "no targets configured; add a [targets.<name>] table".to_string(),
        ));
    }

    let options = SyncOptions {
        dry_run: args.dry_run,
        force: args.force,
    };
    let reports = match args.target.as_deref() {
        Some(name) => vec![engine.sync_target(name, options)?],
        None => engine.sync_all(options)?,
    };

    let failed: usize = reports.iter().map(|r| r.errors.len()).sum();
    let completed = reports.iter().filter(|r| r.is_success()).count();
    if ctx.robot_mode {
        let payload = serde_json::json!({ "reports": reports });
        emit_robot(&robot_outcome(payload, completed, failed))?;
    } else {
        emit_human(human_reports(&reports, args.dry_run));
    }

    if failed > 0 {
        let total = reports
            .iter()
            .map(|r| r.errors.len() + r.linked.len() + r.copied.len() + r.updated.len())
            .sum();
        return Err(SkillsyncError::PartialFailure { failed, total });
    }
    Ok(())
}

fn human_reports(reports: &[SyncReport], dry_run: bool) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(if dry_run { "Sync (dry run)" } else { "Sync" });
    for report in reports {
        layout
            .section(&report.target)
            .kv("Path", &report.path.display().to_string())
            .kv("Mode", report.mode.as_str());
        for (tag, names) in [
            ("linked", &report.linked),
            ("copied", &report.copied),
            ("updated", &report.updated),
            ("pruned", &report.pruned),
        ] {
            for name in names {
                layout.status(true, tag, name);
            }
        }
        if !report.unchanged.is_empty() {
            layout.kv("Up to date", &report.unchanged.len().to_string());
        }
        if report.filtered > 0 {
            layout.kv("Filtered out", &report.filtered.to_string());
        }
        if report.manifest_removed {
            layout.bullet("manifest removed");
        }
        for failure in &report.errors {
            layout.status(
                false,
                "conflict",
                &format!("{}: {}", failure.skill, failure.error.message),
            );
        }
        for notice in &report.notices {
            layout.bullet(notice);
        }
        layout.push_line(report.summary_line()).blank();
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Parser, Subcommand};

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        cmd: TestCommand,
    }

    #[derive(Subcommand)]
    enum TestCommand {
        Sync(SyncArgs),
    }

    fn parse(args: &[&str]) -> SyncArgs {
        let mut argv = vec!["test", "sync"];
        argv.extend_from_slice(args);
        match TestCli::parse_from(argv).cmd {
            TestCommand::Sync(args) => args,
        }
    }

    #[test]
    fn parse_defaults_to_all_targets() {
        let args = parse(&[]);
        assert!(args.target.is_none());
        assert!(!args.dry_run);
        assert!(!args.force);
    }

    #[test]
    fn parse_single_target_with_flags() {
        let args = parse(&["claude", "-n", "--force"]);
        assert_eq!(args.target.as_deref(), Some("claude"));
        assert!(args.dry_run);
        assert!(args.force);
    }
}
