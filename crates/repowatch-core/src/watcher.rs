//! File system watcher for package-file changes.
//!
//! Uses the platform's recommended `notify` backend (inotify on Linux)
//! with a recursive subscription. Events are forwarded one by one as they
//! arrive: no debouncing, no coalescing.

use crate::{PackagePattern, RepoError};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Package-file change kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File was created
    Created,
    /// File was written
    Modified,
    /// File was moved into its directory
    MovedIn,
    /// File was moved out of its directory
    MovedOut,
    /// File was deleted
    Removed,
}

/// A package-file change. Consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path to the changed file
    pub path: PathBuf,
    /// Kind of change
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Repository directory containing the changed file
    pub fn directory(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Raw notification kinds a watch backend can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// File closed after being opened for writing
    CloseWrite,
    /// File content written
    Write,
    /// Entry created
    Create,
    /// Entry removed
    Remove,
    /// Entry renamed away from this path
    RenameFrom,
    /// Entry renamed onto this path
    RenameTo,
}

impl WatchKind {
    fn change_kind(self) -> ChangeKind {
        match self {
            WatchKind::CloseWrite | WatchKind::Write => ChangeKind::Modified,
            WatchKind::Create => ChangeKind::Created,
            WatchKind::Remove => ChangeKind::Removed,
            WatchKind::RenameFrom => ChangeKind::MovedOut,
            WatchKind::RenameTo => ChangeKind::MovedIn,
        }
    }
}

const LINUX_HOST_KINDS: &[WatchKind] = &[
    WatchKind::CloseWrite,
    WatchKind::RenameTo,
    WatchKind::RenameFrom,
    WatchKind::Remove,
];

const PORTABLE_KINDS: &[WatchKind] = &[
    WatchKind::Write,
    WatchKind::Create,
    WatchKind::Remove,
    WatchKind::RenameFrom,
    WatchKind::RenameTo,
];

/// Which raw kinds are observed, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchProfile {
    /// Linux host: close-after-write, moved-in, moved-out, removed
    LinuxHost,
    /// Any other host: write, create, remove, rename
    Portable,
}

impl WatchProfile {
    /// Resolve the profile from the platform flag.
    pub fn from_linux_host(linux_host: bool) -> Self {
        if linux_host {
            WatchProfile::LinuxHost
        } else {
            WatchProfile::Portable
        }
    }

    /// Raw kinds this profile forwards
    pub fn kinds(&self) -> &'static [WatchKind] {
        match self {
            WatchProfile::LinuxHost => LINUX_HOST_KINDS,
            WatchProfile::Portable => PORTABLE_KINDS,
        }
    }

    /// Whether `kind` is observed under this profile
    pub fn observes(&self, kind: WatchKind) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Recursive watcher producing package-file [`ChangeEvent`]s.
pub struct ChangeWatcher {
    rx: mpsc::Receiver<ChangeEvent>,
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Subscribe to changes under `root`.
    pub fn start(
        root: &Path,
        profile: WatchProfile,
        pattern: PackagePattern,
    ) -> Result<Self, RepoError> {
        if !root.is_dir() {
            return Err(RepoError::Watcher(format!(
                "watch root is not a directory: {}",
                root.display()
            )));
        }

        let (tx, rx) = mpsc::channel(1000);

        let mut watcher = notify::recommended_watcher(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    for change in classify(&event, profile, &pattern) {
                        // Blocks the backend thread instead of dropping events when full.
                        if let Err(e) = tx.blocking_send(change) {
                            error!(error = %e, "Failed to send change event");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Watcher error");
                }
            },
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        info!(path = %root.display(), profile = ?profile, "Started watching");

        Ok(Self {
            rx,
            _watcher: watcher,
        })
    }

    /// Receive the next package-file change.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

/// Translate a backend event into the package-file changes a profile forwards.
pub fn classify(event: &Event, profile: WatchProfile, pattern: &PackagePattern) -> Vec<ChangeEvent> {
    raw_kinds(event)
        .into_iter()
        .filter(|(kind, path)| {
            debug!(kind = ?kind, path = %path.display(), "Event");
            profile.observes(*kind) && pattern.matches(path)
        })
        .map(|(kind, path)| ChangeEvent {
            path: path.clone(),
            kind: kind.change_kind(),
        })
        .collect()
}

fn raw_kinds(event: &Event) -> Vec<(WatchKind, &PathBuf)> {
    let all = |kind: WatchKind| event.paths.iter().map(|p| (kind, p)).collect::<Vec<_>>();

    match &event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => all(WatchKind::CloseWrite),
        EventKind::Create(_) => all(WatchKind::Create),
        EventKind::Remove(_) => all(WatchKind::Remove),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(WatchKind::RenameFrom),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(WatchKind::RenameTo),
        // Backends also deliver each side as its own From/To event
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),
        // Backends that cannot tell the direction of a rename
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    WatchKind::RenameTo
                } else {
                    WatchKind::RenameFrom
                };
                (kind, p)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => all(WatchKind::Write),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use tempfile::tempdir;

    fn rpm() -> PackagePattern {
        PackagePattern::new("*.rpm").unwrap()
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn kinds(event: &Event, profile: WatchProfile) -> Vec<ChangeKind> {
        classify(event, profile, &rpm())
            .into_iter()
            .map(|c| c.kind)
            .collect()
    }

    #[test]
    fn test_profile_from_flag() {
        assert_eq!(WatchProfile::from_linux_host(true), WatchProfile::LinuxHost);
        assert_eq!(WatchProfile::from_linux_host(false), WatchProfile::Portable);
    }

    #[test]
    fn test_profile_capabilities() {
        assert!(WatchProfile::LinuxHost.observes(WatchKind::CloseWrite));
        assert!(!WatchProfile::LinuxHost.observes(WatchKind::Create));
        assert!(!WatchProfile::LinuxHost.observes(WatchKind::Write));
        assert!(WatchProfile::Portable.observes(WatchKind::Create));
        assert!(!WatchProfile::Portable.observes(WatchKind::CloseWrite));
    }

    #[test]
    fn test_create_on_portable() {
        let e = event(EventKind::Create(CreateKind::File), &["/repo/a/y.rpm"]);
        let changes = classify(&e, WatchProfile::Portable, &rpm());
        assert_eq!(
            changes,
            vec![ChangeEvent {
                path: PathBuf::from("/repo/a/y.rpm"),
                kind: ChangeKind::Created,
            }]
        );
        assert_eq!(changes[0].directory(), Some(Path::new("/repo/a")));
    }

    #[test]
    fn test_create_ignored_on_linux_host() {
        let e = event(EventKind::Create(CreateKind::File), &["/repo/a/y.rpm"]);
        assert!(kinds(&e, WatchProfile::LinuxHost).is_empty());
    }

    #[test]
    fn test_close_write_on_linux_host() {
        let e = event(
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            &["/repo/a/y.rpm"],
        );
        assert_eq!(kinds(&e, WatchProfile::LinuxHost), vec![ChangeKind::Modified]);
        assert!(kinds(&e, WatchProfile::Portable).is_empty());
    }

    #[test]
    fn test_write_on_portable() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/repo/a/y.rpm"],
        );
        assert_eq!(kinds(&e, WatchProfile::Portable), vec![ChangeKind::Modified]);
        assert!(kinds(&e, WatchProfile::LinuxHost).is_empty());
    }

    #[test]
    fn test_metadata_change_ignored() {
        let e = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/repo/a/y.rpm"],
        );
        assert!(kinds(&e, WatchProfile::Portable).is_empty());
    }

    #[test]
    fn test_remove_on_both_profiles() {
        let e = event(EventKind::Remove(RemoveKind::File), &["/repo/a/y.rpm"]);
        assert_eq!(kinds(&e, WatchProfile::LinuxHost), vec![ChangeKind::Removed]);
        assert_eq!(kinds(&e, WatchProfile::Portable), vec![ChangeKind::Removed]);
    }

    #[test]
    fn test_rename_sides_on_linux_host() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/repo/a/y.rpm"],
        );
        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/repo/b/y.rpm"],
        );
        assert_eq!(kinds(&from, WatchProfile::LinuxHost), vec![ChangeKind::MovedOut]);
        assert_eq!(kinds(&to, WatchProfile::LinuxHost), vec![ChangeKind::MovedIn]);
    }

    #[test]
    fn test_paired_rename_adds_no_changes() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/repo/a/y.rpm", "/repo/b/y.rpm"],
        );
        assert!(kinds(&e, WatchProfile::LinuxHost).is_empty());
        assert!(kinds(&e, WatchProfile::Portable).is_empty());
    }

    #[test]
    fn test_rename_from_upload_name_only_forwards_package_side() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/repo/a/.y.rpm.part"],
        );
        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/repo/a/y.rpm"],
        );
        assert!(kinds(&from, WatchProfile::Portable).is_empty());
        assert_eq!(kinds(&to, WatchProfile::Portable), vec![ChangeKind::MovedIn]);
    }

    #[test]
    fn test_undirected_rename_uses_existence() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("here.rpm");
        std::fs::write(&present, b"").unwrap();
        let gone = dir.path().join("gone.rpm");

        let e = Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            paths: vec![present, gone],
            attrs: Default::default(),
        };
        assert_eq!(
            kinds(&e, WatchProfile::Portable),
            vec![ChangeKind::MovedIn, ChangeKind::MovedOut]
        );
    }

    #[test]
    fn test_non_package_paths_discarded() {
        for path in ["/repo/a/repodata/repomd.xml", "/repo/a/repoUpdate.lock", "/repo/a"] {
            let e = event(EventKind::Create(CreateKind::Any), &[path]);
            assert!(kinds(&e, WatchProfile::Portable).is_empty(), "{path}");
        }
    }

    #[test]
    fn test_access_and_other_ignored() {
        let read = event(EventKind::Access(AccessKind::Read), &["/repo/a/y.rpm"]);
        let other = event(EventKind::Other, &["/repo/a/y.rpm"]);
        assert!(kinds(&read, WatchProfile::LinuxHost).is_empty());
        assert!(kinds(&other, WatchProfile::Portable).is_empty());
    }

    #[test]
    fn test_start_rejects_missing_root() {
        let dir = tempdir().unwrap();
        let result = ChangeWatcher::start(&dir.path().join("nope"), WatchProfile::Portable, rpm());
        assert!(matches!(result, Err(RepoError::Watcher(_))));
    }

    #[tokio::test]
    async fn test_start_watching() {
        let dir = tempdir().unwrap();
        assert!(ChangeWatcher::start(dir.path(), WatchProfile::Portable, rpm()).is_ok());
    }
}
