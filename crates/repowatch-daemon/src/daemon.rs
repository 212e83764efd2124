//! Daemon lifecycle management.

use anyhow::{Context, Result};
use repowatch_core::{
    ChangeWatcher, Config, DirectoryScanner, Dispatcher, PackagePattern, PendingDirectorySet,
    UpdateCoordinator, UpdateOutcome,
};
use std::sync::Arc;

use crate::signals;

/// The main daemon process
pub struct Daemon {
    config: Config,
    pattern: PackagePattern,
    dispatcher: Dispatcher,
}

impl Daemon {
    /// Create a daemon from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        let pattern = config
            .package_pattern()
            .context("Failed to compile package pattern")?;

        let coordinator = Arc::new(UpdateCoordinator::from_config(&config));
        let dispatcher = Dispatcher::new(coordinator, config.max_concurrent_updates);

        Ok(Self {
            config,
            pattern,
            dispatcher,
        })
    }

    /// Run until SIGINT/SIGTERM: startup pass, then one update per change.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            root = %self.config.root_dir.display(),
            indexer = %self.config.indexer_command,
            profile = ?self.config.watch_profile(),
            "Daemon starting"
        );

        // Subscribe before scanning so changes made during the scan are not missed
        let mut watcher = ChangeWatcher::start(
            &self.config.root_dir,
            self.config.watch_profile(),
            self.pattern.clone(),
        )
        .context("Failed to start watching")?;

        let dirs = self.scan().await?;
        // Startup updates run detached, like every other update
        drop(self.dispatcher.dispatch_initial(dirs));

        let shutdown = signals::wait_for_shutdown();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = watcher.next() => match event {
                    Some(event) => {
                        self.dispatcher.dispatch_change(event);
                    }
                    None => anyhow::bail!("Watch stream ended"),
                },
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        tracing::info!("Daemon stopped");

        Ok(())
    }

    /// Startup pass only: scan, update every directory, wait for all of them.
    pub async fn run_once(&self) -> Result<()> {
        let dirs = self.scan().await?;

        let mut incremental = 0;
        let mut rebuilt = 0;
        let mut failed = 0;

        for handle in self.dispatcher.dispatch_initial(dirs) {
            match handle.await {
                Ok(UpdateOutcome::Incremental) => incremental += 1,
                Ok(UpdateOutcome::Rebuilt) => rebuilt += 1,
                Ok(UpdateOutcome::Degraded | UpdateOutcome::LockUnavailable) => failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Update task failed");
                    failed += 1;
                }
            }
        }

        tracing::info!(incremental, rebuilt, failed, "Startup pass complete");

        Ok(())
    }

    /// Initial scan on a blocking thread. Failure is fatal.
    async fn scan(&self) -> Result<PendingDirectorySet> {
        let scanner = DirectoryScanner::new(self.pattern.clone());
        let root = self.config.root_dir.clone();

        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .context("Scan task failed")?
            .context("Initial scan failed")
    }
}
