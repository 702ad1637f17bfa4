//! skillsync status - Inspect each target and report name coincidences.

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::sync::{
    CoincidenceReport, TargetState, TargetStatus, check_name_collisions, check_status, scan,
};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {}

#[derive(Serialize)]
struct StatusPayload {
    source: String,
    source_exists: bool,
    skills: usize,
    targets: Vec<TargetStatus>,
    coincidences: CoincidenceReport,
}

pub fn run(ctx: &AppContext, _args: &StatusArgs) -> Result<()> {
    let targets = ctx.config.target_configs();
    let source_exists = ctx.source_root.is_dir();
    let skills = if source_exists {
        scan(&ctx.source_root)?
    } else {
        Vec::new()
    };
    let coincidences = check_name_collisions(&skills, &targets)?;
    let statuses: Vec<TargetStatus> = targets
        .iter()
        .map(|target| check_status(target, &ctx.source_root))
        .collect();

    let payload = StatusPayload {
        source: ctx.source_root.display().to_string(),
        source_exists,
        skills: skills.len(),
        targets: statuses,
        coincidences,
    };

    if ctx.robot_mode {
        return emit_robot(&robot_ok(&payload));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Status")
        .kv("Source", &payload.source)
        .kv("Skills", &payload.skills.to_string());
    if !payload.source_exists {
        layout.bullet("managed tree does not exist yet; run `skillsync install` first");
    }
    layout
        .blank()
        .section("Targets");
    if payload.targets.is_empty() {
        layout.push_line("No targets configured");
    }
    for status in &payload.targets {
        let ok = !matches!(
            status.state,
            TargetState::Conflict | TargetState::Broken | TargetState::Unknown
        );
        layout.status(
            ok,
            &status.name,
            &format!("[{}] {} ({})", status.mode, status.detail(), status.path.display()),
        );
        if let Some(found) = payload.coincidences.per_target.get(&status.name) {
            for coincidence in found {
                layout.bullet(&format!("  note: {}", coincidence.message()));
            }
        }
    }
    emit_human(layout);
    Ok(())
}
