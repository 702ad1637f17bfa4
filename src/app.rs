//! Per-invocation application state shared by command handlers.

use std::path::PathBuf;

use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::sync::SyncEngine;

pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    /// Root of the managed tree.
    pub source_root: PathBuf,
    pub robot_mode: bool,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &cwd)?;
        Ok(Self::with_config(config, cli))
    }

    #[must_use]
    pub fn with_config(config: Config, cli: &Cli) -> Self {
        let source_root = config.source_root();
        debug!(source = %source_root.display(), targets = config.targets.len(), "configuration loaded");
        Self {
            robot_mode: cli.robot || config.output.robot,
            config_path: cli.config.clone(),
            source_root,
            verbosity: cli.verbose,
            config,
        }
    }

    /// Reconciler over the configured targets.
    #[must_use]
    pub fn sync_engine(&self) -> SyncEngine {
        SyncEngine::new(self.source_root.clone(), self.config.target_configs())
    }
}
