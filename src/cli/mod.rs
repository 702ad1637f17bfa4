//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Install skill bundles and mirror them into per-tool directories
#[derive(Parser, Debug)]
#[command(name = "skillsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Emit JSON for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/skillsync/config.toml + ./.skillsync/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install skills from a local path, git URL, or owner/repo shorthand
    Install(commands::install::InstallArgs),

    /// Reinstall skills from their recorded source
    Update(commands::update::UpdateArgs),

    /// Reconcile targets with the managed tree
    Sync(commands::sync::SyncArgs),

    /// Show the state of each target
    Status(commands::status::StatusArgs),

    /// List skills in the managed tree
    List(commands::list::ListArgs),
}
