//! Lock, index, fall back to a full rebuild, unlock.

use crate::{CommandIndexer, Config, FileLockService, Indexer, NamedMutex};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a single update attempt ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The incremental update succeeded
    Incremental,
    /// The incremental update failed and the full rebuild succeeded
    Rebuilt,
    /// Both invocations failed; the directory stays degraded until the next trigger
    Degraded,
    /// The lock could not be taken, nothing was run
    LockUnavailable,
}

/// Runs one update of a repository directory's metadata under its lock.
pub struct UpdateCoordinator {
    locks: Arc<dyn NamedMutex>,
    indexer: Arc<dyn Indexer>,
    metadata_dirs: Vec<String>,
}

impl UpdateCoordinator {
    /// Create a coordinator from explicit collaborators.
    pub fn new(
        locks: Arc<dyn NamedMutex>,
        indexer: Arc<dyn Indexer>,
        metadata_dirs: Vec<String>,
    ) -> Self {
        Self {
            locks,
            indexer,
            metadata_dirs,
        }
    }

    /// Create a coordinator with the lock-file backend and command indexer.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(FileLockService::new(
                config.lock_file_name.clone(),
                config.lock_retry_interval(),
            )),
            Arc::new(CommandIndexer::new(
                config.indexer_command.clone(),
                config.cache_dir_name.clone(),
            )),
            config.metadata_dirs.clone(),
        )
    }

    /// The lock service guarding each directory
    pub fn locks(&self) -> &Arc<dyn NamedMutex> {
        &self.locks
    }

    /// Bring the metadata of `dir` up to date.
    ///
    /// Failures are logged, never returned: a failed incremental update
    /// leaves the previous metadata servable, and the rebuild fallback
    /// gets one attempt per trigger.
    pub async fn update(&self, dir: &Path) -> UpdateOutcome {
        let guard = match self.locks.acquire(dir).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Could not lock directory, skipping update");
                return UpdateOutcome::LockUnavailable;
            }
        };

        let outcome = match self.indexer.index(dir).await {
            Ok(()) => {
                debug!(path = %dir.display(), "Successfully updated repository");
                UpdateOutcome::Incremental
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Could not update repository");
                info!(path = %dir.display(), "Regenerating whole repository");

                self.clear_metadata(dir).await;

                match self.indexer.index(dir).await {
                    Ok(()) => {
                        info!(path = %dir.display(), "Repository rebuilt");
                        UpdateOutcome::Rebuilt
                    }
                    Err(e) => {
                        error!(path = %dir.display(), error = %e, "Rebuild failed, repository left without metadata");
                        UpdateOutcome::Degraded
                    }
                }
            }
        };

        info!(path = %dir.display(), "Unlocking directory");
        drop(guard);

        outcome
    }

    /// Remove every metadata subtree so the next invocation starts from scratch.
    async fn clear_metadata(&self, dir: &Path) {
        for name in &self.metadata_dirs {
            let path = dir.join(name);
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed metadata"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove metadata"),
            }
        }
    }
}
