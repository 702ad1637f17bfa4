//! skillsync - Install agent skills into one managed tree and mirror it into every agent's directory.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skillsync::Result;
use skillsync::app::AppContext;
use skillsync::cli::Cli;
use skillsync::cli::output::{emit_robot, render_error, robot_error_structured};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut robot = cli.robot;
    match run(&cli, &mut robot) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Partial failures already emitted their report.
            if robot {
                if !e.is_partial() && emit_robot(&robot_error_structured(&e)).is_err() {
                    eprintln!("{}", render_error(&e));
                }
            } else {
                eprintln!("{}", render_error(&e));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, robot: &mut bool) -> Result<()> {
    let ctx = AppContext::from_cli(cli)?;
    *robot = ctx.robot_mode;
    skillsync::cli::commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,skillsync=info",
        1 => "info,skillsync=debug",
        2 => "debug,skillsync=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
