//! repowatch daemon
//!
//! Keeps the metadata of every package repository under a root directory
//! in step with its package files.

mod daemon;
mod logging;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use repowatch_core::Config;
use std::path::PathBuf;

pub use daemon::Daemon;

#[derive(Parser, Debug)]
#[command(name = "repowatch-daemon")]
#[command(about = "Regenerates package repository metadata whenever package files change")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory to scan and watch (overrides REPO_DIR)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Debug logging (same as DEBUG=true)
    #[arg(long)]
    debug: bool,

    /// Use the linux-host watch profile (same as LINUX_HOST=true)
    #[arg(long)]
    linux_host: bool,

    /// Run the startup pass only, wait for it, then exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    /// Flags win over file and environment.
    fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.root_dir = root.clone();
        }
        if self.debug {
            config.debug = true;
        }
        if self.linux_host {
            config.linux_host = true;
        }
    }
}

/// Run the daemon
pub async fn run(config: Config, once: bool) -> Result<()> {
    let daemon = Daemon::new(config)?;
    if once {
        daemon.run_once().await
    } else {
        daemon.run().await
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let _logging = logging::init_logging(&config).context("Failed to initialize logging")?;

    tracing::info!("Repo scanner starting v{}", env!("CARGO_PKG_VERSION"));

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config, cli.once));

    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Repo scanner stopped");
    }

    result
}
