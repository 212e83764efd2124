//! Per-directory mutual exclusion.
//!
//! The coordination contract is [`NamedMutex`]: one exclusive lock per
//! repository directory, released when the returned [`LockGuard`] drops.
//! [`FileLockService`] implements it with `flock(2)` on a lock file inside
//! the directory, which excludes both other tasks in this process (each
//! acquire opens its own file description) and other processes sharing the
//! storage.

use crate::RepoError;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exclusive named lock keyed by a directory path.
#[async_trait]
pub trait NamedMutex: Send + Sync {
    /// Wait until the lock for `dir` is held exclusively.
    async fn acquire(&self, dir: &Path) -> Result<LockGuard, RepoError>;

    /// Clear what an earlier process lifetime left behind for `dir`.
    /// Never breaks a lock that is actually held. Returns `true` when
    /// something was removed.
    fn reclaim_stale(&self, _dir: &Path) -> Result<bool, RepoError> {
        Ok(false)
    }
}

/// Scoped lock ownership. Dropping it releases the lock exactly once,
/// including when the holder unwinds from a panic.
pub struct LockGuard {
    dir: PathBuf,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl LockGuard {
    /// Wrap a backend-specific release action.
    pub fn new(dir: PathBuf, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            dir,
            release: Some(Box::new(release)),
        }
    }

    /// Directory this guard locks
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!(path = %self.dir.display(), "Lock released");
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("dir", &self.dir).finish()
    }
}

/// `flock`-backed lock files named `file_name` inside each directory.
#[derive(Debug, Clone)]
pub struct FileLockService {
    file_name: String,
    retry_interval: Duration,
}

impl FileLockService {
    /// Create a lock service using `file_name` inside each locked directory.
    pub fn new(file_name: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            file_name: file_name.into(),
            retry_interval,
        }
    }

    /// Path of the lock file for `dir`.
    pub fn lock_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.file_name)
    }
}

#[async_trait]
impl NamedMutex for FileLockService {
    async fn acquire(&self, dir: &Path) -> Result<LockGuard, RepoError> {
        let path = self.lock_path(dir);
        let mut waiting = false;

        info!(path = %path.display(), "Acquiring lock file");

        loop {
            // Reopen every attempt: the file may have been unlinked and recreated.
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)
                .map_err(|source| RepoError::LockFile {
                    path: path.clone(),
                    source,
                })?;

            match try_lock_exclusive(&file) {
                Ok(true) if is_current(&file, &path) => {
                    debug!(path = %path.display(), "Lock acquired");
                    return Ok(LockGuard::new(dir.to_path_buf(), move || unlock(file)));
                }
                Ok(true) => {
                    debug!(path = %path.display(), "Lock file replaced while locking, retrying");
                    continue;
                }
                Ok(false) => {
                    if !waiting {
                        debug!(path = %path.display(), "Lock held elsewhere, waiting");
                        waiting = true;
                    }
                }
                Err(source) => return Err(RepoError::LockFile { path, source }),
            }

            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Remove a lock file left behind by an earlier run.
    ///
    /// Only a file nobody holds is removed, and it is unlinked while we hold
    /// it so a concurrent acquirer notices the inode change and retries.
    /// Returns `true` when a stale file was removed.
    fn reclaim_stale(&self, dir: &Path) -> Result<bool, RepoError> {
        let path = self.lock_path(dir);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(RepoError::LockFile { path, source }),
        };

        match try_lock_exclusive(&file) {
            Ok(true) => {
                if is_current(&file, &path) {
                    std::fs::remove_file(&path)
                        .map_err(|source| RepoError::LockFile { path: path.clone(), source })?;
                    info!(path = %path.display(), "Removed stale lock file");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Ok(false) => {
                warn!(path = %path.display(), "Lock file is held by a live process, leaving it");
                Ok(false)
            }
            Err(source) => Err(RepoError::LockFile { path, source }),
        }
    }
}

/// Non-blocking exclusive `flock`. `Ok(false)` means another holder has it.
fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    loop {
        // SAFETY: flock is safe on a valid file descriptor
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(code) if code == libc::EWOULDBLOCK || code == libc::EAGAIN => return Ok(false),
            _ => return Err(err),
        }
    }
}

fn unlock(file: File) {
    // SAFETY: flock with LOCK_UN is safe on a valid file descriptor
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

/// Whether `file` is still the file linked at `path`.
fn is_current(file: &File, path: &Path) -> bool {
    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}
