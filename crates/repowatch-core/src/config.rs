//! Configuration for the repowatch daemon.
//!
//! Built once at startup from defaults, an optional YAML file and
//! environment variables, then handed to every component. Nothing
//! reads configuration from ambient global state after that.

use crate::{PackagePattern, RepoError, WatchProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the repository tree to scan and watch
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory for rotated log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log file name prefix inside `log_dir`
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Number of rotated log files to keep
    #[serde(default = "default_log_max_files")]
    pub log_max_files: usize,

    /// Raise log verbosity to debug
    #[serde(default)]
    pub debug: bool,

    /// Use the linux-host watch profile instead of the portable one
    #[serde(default)]
    pub linux_host: bool,

    /// Glob matched against file names to recognise package files
    #[serde(default = "default_package_pattern")]
    pub package_pattern: String,

    /// Indexer command, invoked as `<cmd> --update <dir> --cachedir <dir>/<cache_dir>`
    #[serde(default = "default_indexer_command")]
    pub indexer_command: String,

    /// Name of the indexer's working cache directory inside each repository
    #[serde(default = "default_cache_dir_name")]
    pub cache_dir_name: String,

    /// Metadata subtrees removed before a full rebuild
    #[serde(default = "default_metadata_dirs")]
    pub metadata_dirs: Vec<String>,

    /// Name of the per-directory lock file
    #[serde(default = "default_lock_file_name")]
    pub lock_file_name: String,

    /// Delay between lock attempts while another holder has the lock
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,

    /// Cap on concurrently running updates; unbounded when unset
    #[serde(default)]
    pub max_concurrent_updates: Option<usize>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/repo")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/logs/repo-scanner")
}

fn default_log_file() -> String {
    "scanner.log".to_string()
}

fn default_log_max_files() -> usize {
    3
}

fn default_package_pattern() -> String {
    "*.rpm".to_string()
}

fn default_indexer_command() -> String {
    "createrepo".to_string()
}

fn default_cache_dir_name() -> String {
    "cachedir".to_string()
}

fn default_metadata_dirs() -> Vec<String> {
    vec!["repodata".to_string(), ".repodata".to_string()]
}

fn default_lock_file_name() -> String {
    "repoUpdate.lock".to_string()
}

fn default_lock_retry_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            log_dir: default_log_dir(),
            log_file: default_log_file(),
            log_max_files: default_log_max_files(),
            debug: false,
            linux_host: false,
            package_pattern: default_package_pattern(),
            indexer_command: default_indexer_command(),
            cache_dir_name: default_cache_dir_name(),
            metadata_dirs: default_metadata_dirs(),
            lock_file_name: default_lock_file_name(),
            lock_retry_ms: default_lock_retry_ms(),
            max_concurrent_updates: None,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the YAML file if given, then the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, RepoError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific YAML file
    pub fn load_from(path: &Path) -> Result<Self, RepoError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepoError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Override fields from environment-style variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RepoError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("REPO_DIR") {
            self.root_dir = PathBuf::from(root);
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("DEBUG") {
            self.debug = is_true(&flag);
        }
        if let Some(flag) = lookup("LINUX_HOST") {
            self.linux_host = is_true(&flag);
        }
        if let Some(pattern) = lookup("PACKAGE_PATTERN") {
            self.package_pattern = pattern;
        }
        if let Some(command) = lookup("INDEXER_COMMAND") {
            self.indexer_command = command;
        }
        if let Some(cap) = lookup("MAX_CONCURRENT_UPDATES") {
            let cap = cap.trim().parse::<usize>().map_err(|_| {
                RepoError::Config(format!("MAX_CONCURRENT_UPDATES is not a number: {}", cap))
            })?;
            self.max_concurrent_updates = Some(cap);
        }
        Ok(())
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), RepoError> {
        if self.indexer_command.trim().is_empty() {
            return Err(RepoError::Config("indexer_command is empty".to_string()));
        }
        if self.lock_file_name.is_empty() || self.lock_file_name.contains('/') {
            return Err(RepoError::Config(format!(
                "lock_file_name must be a plain file name: {:?}",
                self.lock_file_name
            )));
        }
        if self.max_concurrent_updates == Some(0) {
            return Err(RepoError::Config(
                "max_concurrent_updates must be at least 1".to_string(),
            ));
        }
        self.package_pattern()?;
        Ok(())
    }

    /// Compile the package-file pattern
    pub fn package_pattern(&self) -> Result<PackagePattern, RepoError> {
        PackagePattern::new(&self.package_pattern)
    }

    /// Watch profile selected by the platform flag
    pub fn watch_profile(&self) -> WatchProfile {
        WatchProfile::from_linux_host(self.linux_host)
    }

    /// Lock retry interval
    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms)
    }
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
