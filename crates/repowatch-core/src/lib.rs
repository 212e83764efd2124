//! repowatch core
//!
//! Keeps package repository directories' metadata in step with their
//! package files:
//! - Startup discovery of directories holding package files
//! - Recursive change watching filtered to package files
//! - Per-directory `flock` locking shared with other processes
//! - Incremental indexing with a full-rebuild fallback
//! - Fan-out of every trigger to its own update task
//!
//! Unix only: locking is built on `flock(2)`.

mod config;
mod coordinator;
mod dispatcher;
mod error;
mod indexer;
mod lock;
mod pattern;
mod scanner;
pub mod watcher;

pub use config::Config;
pub use coordinator::{UpdateCoordinator, UpdateOutcome};
pub use dispatcher::Dispatcher;
pub use error::RepoError;
pub use indexer::{CommandIndexer, Indexer};
pub use lock::{FileLockService, LockGuard, NamedMutex};
pub use pattern::PackagePattern;
pub use scanner::{DirectoryScanner, PendingDirectorySet};
pub use watcher::{ChangeEvent, ChangeKind, ChangeWatcher, WatchKind, WatchProfile};
