//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod install;
pub mod list;
pub mod status;
pub mod sync;
pub mod update;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Install(args) => install::run(ctx, args),
        Commands::Update(args) => update::run(ctx, args),
        Commands::Sync(args) => sync::run(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
        Commands::List(args) => list::run(ctx, args),
    }
}
