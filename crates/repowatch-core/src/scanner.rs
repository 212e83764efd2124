//! Startup discovery of repository directories.

use crate::{PackagePattern, RepoError};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directories found by the startup scan, in path order.
pub type PendingDirectorySet = BTreeSet<PathBuf>;

/// Finds every directory that directly contains a package file.
pub struct DirectoryScanner {
    pattern: PackagePattern,
}

impl DirectoryScanner {
    /// Create a scanner matching file names against `pattern`.
    pub fn new(pattern: PackagePattern) -> Self {
        Self { pattern }
    }

    /// Walk `root` and collect the directories holding package files.
    ///
    /// Only a root that cannot be traversed is an error; unreadable
    /// entries below it are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<PendingDirectorySet, RepoError> {
        let metadata = root.metadata().map_err(|source| RepoError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(RepoError::RootUnavailable {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a directory",
                ),
            });
        }
        std::fs::read_dir(root).map_err(|source| RepoError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

        info!(path = %root.display(), pattern = self.pattern.as_str(), "Scanning for package directories");

        // A repository tree is not a source tree: no ignore files, no hidden-entry filtering.
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .build();

        let mut dirs = PendingDirectorySet::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) if e.depth() == Some(0) => {
                    return Err(RepoError::RootUnavailable {
                        path: root.to_path_buf(),
                        source: std::io::Error::other(e.to_string()),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            if is_dir || !self.pattern.matches(entry.path()) {
                continue;
            }

            if let Some(parent) = entry.path().parent() {
                if dirs.insert(parent.to_path_buf()) {
                    debug!(path = %parent.display(), "Adding package directory");
                }
            }
        }

        info!(count = dirs.len(), "Package directories found");

        Ok(dirs)
    }
}
