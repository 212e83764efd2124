//! Fan-out of directories to independent update tasks.
//!
//! Every trigger gets its own task; nothing is coalesced or debounced.
//! Updates of the same directory are serialized only by its lock.

use crate::{ChangeEvent, PendingDirectorySet, UpdateCoordinator, UpdateOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawns one [`UpdateCoordinator::update`] task per trigger.
pub struct Dispatcher {
    coordinator: Arc<UpdateCoordinator>,
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    /// Create a dispatcher. `max_concurrent` caps running updates; `None`
    /// leaves fan-out unbounded.
    pub fn new(coordinator: Arc<UpdateCoordinator>, max_concurrent: Option<usize>) -> Self {
        Self {
            coordinator,
            limit: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }

    /// Start an update of `dir` in its own task.
    ///
    /// Never waits: with a cap, the task itself queues for a permit.
    pub fn dispatch(&self, dir: PathBuf) -> JoinHandle<UpdateOutcome> {
        self.spawn_update(dir, false)
    }

    /// Dispatch the startup scan result. Each task reclaims the
    /// directory's stale lock file before updating.
    pub fn dispatch_initial(&self, dirs: PendingDirectorySet) -> Vec<JoinHandle<UpdateOutcome>> {
        info!(count = dirs.len(), "Running startup update of package directories");

        dirs.into_iter()
            .map(|dir| self.spawn_update(dir, true))
            .collect()
    }

    fn spawn_update(&self, dir: PathBuf, reclaim: bool) -> JoinHandle<UpdateOutcome> {
        let coordinator = self.coordinator.clone();
        let limit = self.limit.clone();

        debug!(path = %dir.display(), "Spawning update task");

        tokio::spawn(async move {
            if reclaim {
                reclaim_stale(&coordinator, &dir).await;
            }
            let _permit = match limit {
                Some(limit) => limit.acquire_owned().await.ok(),
                None => None,
            };
            coordinator.update(&dir).await
        })
    }

    /// Dispatch the directory containing a changed package file.
    pub fn dispatch_change(&self, event: ChangeEvent) -> Option<JoinHandle<UpdateOutcome>> {
        let dir = event
            .directory()
            .filter(|dir| !dir.as_os_str().is_empty())?
            .to_path_buf();

        info!(path = %dir.display(), kind = ?event.kind, "Package change detected");

        Some(self.dispatch(dir))
    }
}

/// Lock-file inspection is blocking I/O; keep it off the runtime workers.
async fn reclaim_stale(coordinator: &Arc<UpdateCoordinator>, dir: &Path) {
    let locks = coordinator.locks().clone();
    let path = dir.to_path_buf();

    match tokio::task::spawn_blocking(move || locks.reclaim_stale(&path)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(path = %dir.display(), error = %e, "Could not inspect lock file"),
        Err(e) => warn!(path = %dir.display(), error = %e, "Lock file inspection task failed"),
    }
}
