//! Package-file name matching.

use crate::RepoError;
use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;

/// Compiled package-file pattern, matched case-sensitively against file names.
#[derive(Debug, Clone)]
pub struct PackagePattern {
    source: String,
    matcher: GlobMatcher,
}

impl PackagePattern {
    /// Compile a glob such as `*.rpm`.
    pub fn new(glob: &str) -> Result<Self, RepoError> {
        let matcher = GlobBuilder::new(glob)
            .case_insensitive(false)
            .literal_separator(true)
            .build()?
            .compile_matcher();

        Ok(Self {
            source: glob.to_string(),
            matcher,
        })
    }

    /// Whether the final component of `path` is a package file name.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.matcher.is_match(name))
            .unwrap_or(false)
    }

    /// The glob this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}
