//! Metadata indexer invocation.

use crate::RepoError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Writer of a repository directory's metadata subtree.
///
/// An invocation against a directory with existing metadata updates it in
/// place; against a directory without metadata it builds from scratch.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Index `dir`. Any error counts as a failed invocation.
    async fn index(&self, dir: &Path) -> Result<(), RepoError>;
}

/// Runs an external command such as `createrepo` as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandIndexer {
    command: String,
    cache_dir_name: String,
}

impl CommandIndexer {
    /// Create an indexer running `command` with a cache directory named
    /// `cache_dir_name` inside each repository.
    pub fn new(command: impl Into<String>, cache_dir_name: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cache_dir_name: cache_dir_name.into(),
        }
    }

    /// Arguments for indexing `dir`: `--update <dir> --cachedir <dir>/<cache>`.
    pub fn args(&self, dir: &Path) -> Vec<PathBuf> {
        vec![
            PathBuf::from("--update"),
            dir.to_path_buf(),
            PathBuf::from("--cachedir"),
            dir.join(&self.cache_dir_name),
        ]
    }
}

#[async_trait]
impl Indexer for CommandIndexer {
    async fn index(&self, dir: &Path) -> Result<(), RepoError> {
        let args = self.args(dir);

        info!(
            command = %self.command,
            args = ?args,
            "Running indexer"
        );

        let status = Command::new(&self.command)
            .args(&args)
            .status()
            .await
            .map_err(|source| RepoError::IndexerLaunch {
                command: self.command.clone(),
                source,
            })?;

        if status.success() {
            debug!(path = %dir.display(), "Indexer succeeded");
            Ok(())
        } else {
            Err(RepoError::IndexerExit {
                command: self.command.clone(),
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_args_shape() {
        let indexer = CommandIndexer::new("createrepo", "cachedir");
        let args = indexer.args(Path::new("/repo/a"));
        assert_eq!(
            args,
            vec![
                PathBuf::from("--update"),
                PathBuf::from("/repo/a"),
                PathBuf::from("--cachedir"),
                PathBuf::from("/repo/a/cachedir"),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let dir = tempdir().unwrap();
        let indexer = CommandIndexer::new("true", "cachedir");
        assert!(indexer.index(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = tempdir().unwrap();
        let indexer = CommandIndexer::new("false", "cachedir");
        let result = indexer.index(dir.path()).await;
        assert!(matches!(
            result,
            Err(RepoError::IndexerExit { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_launch_error_is_failure() {
        let dir = tempdir().unwrap();
        let indexer = CommandIndexer::new("/nonexistent/createrepo", "cachedir");
        let result = indexer.index(dir.path()).await;
        assert!(matches!(result, Err(RepoError::IndexerLaunch { .. })));
    }
}
