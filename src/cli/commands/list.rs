//! skillsync list - List skills in the managed tree.

use std::path::Path;

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::install::installer::tracked_repos;
use crate::install::meta::read_meta;
use crate::sync::scan;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only show skills installed from a recorded source
    #[arg(long)]
    pub installed: bool,
}

#[derive(Debug, Serialize)]
struct ListedSkill {
    path: String,
    flat_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct Listing {
    skills: Vec<ListedSkill>,
    tracked_repos: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let listing = if ctx.source_root.is_dir() {
        collect(&ctx.source_root, args.installed)?
    } else {
        Listing {
            skills: Vec::new(),
            tracked_repos: Vec::new(),
        }
    };

    if ctx.robot_mode {
        return emit_robot(&robot_ok(&listing));
    }
    emit_human(human_listing(ctx, &listing));
    Ok(())
}

fn collect(root: &Path, installed_only: bool) -> Result<Listing> {
    let mut skills = Vec::new();
    for skill in scan(root)? {
        let meta = read_meta(&skill.path).ok().flatten();
        if installed_only && meta.is_none() {
            continue;
        }
        skills.push(ListedSkill {
            path: skill.rel_path,
            flat_name: skill.flat_name,
            name: skill.frontmatter_name,
            source: meta.as_ref().map(|m| m.source.clone()),
            source_type: meta.map(|m| m.source_type),
        });
    }
    Ok(Listing {
        skills,
        tracked_repos: tracked_repos(root)?,
    })
}

fn human_listing(ctx: &AppContext, listing: &Listing) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout
        .title("Skills")
        .kv("Source", &ctx.source_root.display().to_string())
        .kv("Count", &listing.skills.len().to_string())
        .blank();
    for skill in &listing.skills {
        let line = match &skill.source {
            Some(source) => format!("{} -> {}  ({source})", skill.path, skill.flat_name),
            None => format!("{} -> {}", skill.path, skill.flat_name),
        };
        layout.bullet(&line);
    }
    if !listing.tracked_repos.is_empty() {
        layout.blank().section("Tracked repositories");
        for repo in &listing.tracked_repos {
            layout.bullet(repo);
        }
    }
    layout
}
