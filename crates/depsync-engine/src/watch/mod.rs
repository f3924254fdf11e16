//! File watcher for the project's manifest and rc file.
//!
//! Watches the active project directory (non-recursively) and forwards
//! coalesced `ProjectChange`s for `bower.json` and `.bowerrc`.

use crate::events::ProjectChange;
use depsync_core::pkg::{MANIFEST_FILE, RC_FILE};
use notify::{
    event::{ModifyKind, RenameMode},
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Event coalescing window.
const COALESCE_WINDOW_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Manifest,
    Rc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Created,
    Changed,
    Deleted,
}

fn role_of(path: &Path) -> Option<Role> {
    match path.file_name()?.to_str()? {
        MANIFEST_FILE => Some(Role::Manifest),
        RC_FILE => Some(Role::Rc),
        _ => None,
    }
}

fn change_for(role: Role, op: Op) -> ProjectChange {
    match (role, op) {
        (Role::Manifest, Op::Created) => ProjectChange::ManifestCreated,
        (Role::Manifest, Op::Changed) => ProjectChange::ManifestChanged,
        (Role::Manifest, Op::Deleted) => ProjectChange::ManifestDeleted,
        (Role::Rc, Op::Created) => ProjectChange::RcCreated,
        (Role::Rc, Op::Changed) => ProjectChange::RcChanged,
        (Role::Rc, Op::Deleted) => ProjectChange::RcDeleted,
    }
}

fn split(change: ProjectChange) -> (Role, Op) {
    match change {
        ProjectChange::ManifestCreated => (Role::Manifest, Op::Created),
        ProjectChange::ManifestChanged => (Role::Manifest, Op::Changed),
        ProjectChange::ManifestDeleted => (Role::Manifest, Op::Deleted),
        ProjectChange::RcCreated => (Role::Rc, Op::Created),
        ProjectChange::RcChanged => (Role::Rc, Op::Changed),
        ProjectChange::RcDeleted => (Role::Rc, Op::Deleted),
    }
}

/// Map a notify event to the project changes it represents.
///
/// A rename with both ends reported deletes the source and changes the
/// target, which is how editors that save through a temp file show up.
fn classify(event: &Event) -> Vec<ProjectChange> {
    event
        .paths
        .iter()
        .enumerate()
        .filter_map(|(index, path)| {
            let role = role_of(path)?;
            let op = match &event.kind {
                EventKind::Create(_) => Op::Created,
                EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                    Op::Deleted
                }
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if index == 0 => Op::Deleted,
                EventKind::Modify(ModifyKind::Metadata(_)) => return None,
                EventKind::Modify(_) => Op::Changed,
                EventKind::Access(_) | EventKind::Any | EventKind::Other => return None,
            };
            Some(change_for(role, op))
        })
        .collect()
}

/// Fold a new change into the pending one for the same file.
///
/// The latest change wins, except that a file created in this window stays
/// created, and one deleted then recreated counts as changed.
fn merge(pending: Option<ProjectChange>, next: ProjectChange) -> ProjectChange {
    let Some(prev) = pending else {
        return next;
    };
    let (role, prev_op) = split(prev);
    let (_, next_op) = split(next);
    let op = match (prev_op, next_op) {
        (Op::Created, Op::Changed) => Op::Created,
        (Op::Deleted, Op::Created) => Op::Changed,
        (_, op) => op,
    };
    change_for(role, op)
}

/// Changes collected during one coalescing window.
#[derive(Debug, Default)]
struct Pending {
    manifest: Option<ProjectChange>,
    rc: Option<ProjectChange>,
}

impl Pending {
    fn push(&mut self, change: ProjectChange) {
        let slot = match split(change).0 {
            Role::Manifest => &mut self.manifest,
            Role::Rc => &mut self.rc,
        };
        *slot = Some(merge(*slot, change));
    }

    fn is_empty(&self) -> bool {
        self.manifest.is_none() && self.rc.is_none()
    }

    /// Rc first: settings affect how the manifest's packages are listed.
    fn drain(&mut self) -> impl Iterator<Item = ProjectChange> {
        [self.rc.take(), self.manifest.take()].into_iter().flatten()
    }
}

/// Watches one project directory until dropped.
pub struct ProjectWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ProjectWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectWatcher")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl ProjectWatcher {
    /// Start watching `dir`, sending coalesced changes to `tx`.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if `dir` is not a directory or the watcher cannot be created.
    pub fn start(dir: &Path, tx: mpsc::UnboundedSender<ProjectChange>) -> Result<Self, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::InvalidRoot(dir.display().to_string()));
        }

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<ProjectChange>();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in classify(&event) {
                        if let Err(e) = raw_tx.send(change) {
                            warn!(error = %e, "Failed to send watch event");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Watch error");
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| WatchError::WatcherFailed(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatcherFailed(e.to_string()))?;
        info!(root = %dir.display(), "Watching directory");

        tokio::spawn(async move {
            process_events(&mut raw_rx, &tx).await;
        });

        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Forward changes once no new event has arrived for a full window.
async fn process_events(
    rx: &mut mpsc::UnboundedReceiver<ProjectChange>,
    tx: &mpsc::UnboundedSender<ProjectChange>,
) {
    let mut pending = Pending::default();

    loop {
        let timeout =
            tokio::time::timeout(Duration::from_millis(COALESCE_WINDOW_MS), rx.recv()).await;

        match timeout {
            Ok(Some(change)) => pending.push(change),
            Ok(None) => {
                debug!("Watch event channel closed");
                break;
            }
            Err(_) => {
                if pending.is_empty() {
                    continue;
                }
                for change in pending.drain() {
                    debug!(change = %change, "Project file changed");
                    if tx.send(change).is_err() {
                        debug!("Change receiver dropped, stopping watcher loop");
                        return;
                    }
                }
            }
        }
    }
}

/// Watcher error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    InvalidRoot(String),
    WatcherFailed(String),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRoot(root) => write!(f, "Invalid watch root: {root}"),
            Self::WatcherFailed(msg) => write!(f, "Watcher failed: {msg}"),
        }
    }
}

impl std::error::Error for WatchError {}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_classify_manifest_and_rc() {
        assert_eq!(
            classify(&event(EventKind::Create(CreateKind::File), &["/p/bower.json"])),
            vec![ProjectChange::ManifestCreated]
        );
        assert_eq!(
            classify(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/p/.bowerrc"]
            )),
            vec![ProjectChange::RcChanged]
        );
        assert_eq!(
            classify(&event(EventKind::Remove(RemoveKind::File), &["/p/bower.json"])),
            vec![ProjectChange::ManifestDeleted]
        );
    }

    #[test]
    fn test_classify_ignores_other_files_and_metadata() {
        assert!(classify(&event(EventKind::Create(CreateKind::File), &["/p/index.js"])).is_empty());
        assert!(classify(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)),
            &["/p/bower.json"]
        ))
        .is_empty());
    }

    #[test]
    fn test_classify_rename_over_manifest() {
        let changes = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/p/.bower.json.swp", "/p/bower.json"],
        ));
        assert_eq!(changes, vec![ProjectChange::ManifestChanged]);

        let changes = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/p/bower.json", "/p/bower.json.bak"],
        ));
        assert_eq!(changes, vec![ProjectChange::ManifestDeleted]);

        let changes = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/p/bower.json"],
        ));
        assert_eq!(changes, vec![ProjectChange::ManifestDeleted]);
    }

    #[test]
    fn test_merge_rules() {
        assert_eq!(
            merge(None, ProjectChange::ManifestChanged),
            ProjectChange::ManifestChanged
        );
        assert_eq!(
            merge(Some(ProjectChange::ManifestCreated), ProjectChange::ManifestChanged),
            ProjectChange::ManifestCreated
        );
        assert_eq!(
            merge(Some(ProjectChange::ManifestDeleted), ProjectChange::ManifestCreated),
            ProjectChange::ManifestChanged
        );
        assert_eq!(
            merge(Some(ProjectChange::RcChanged), ProjectChange::RcDeleted),
            ProjectChange::RcDeleted
        );
    }

    #[test]
    fn test_pending_orders_rc_first() {
        let mut pending = Pending::default();
        pending.push(ProjectChange::ManifestChanged);
        pending.push(ProjectChange::RcCreated);
        pending.push(ProjectChange::RcChanged);

        let drained: Vec<_> = pending.drain().collect();
        assert_eq!(
            drained,
            vec![ProjectChange::RcCreated, ProjectChange::ManifestChanged]
        );
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_missing_dir() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = ProjectWatcher::start(Path::new("/definitely/not/here"), tx);
        assert!(matches!(result, Err(WatchError::InvalidRoot(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reports_manifest_write() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = ProjectWatcher::start(dir.path(), tx).unwrap();
        assert_eq!(watcher.dir(), dir.path());

        std::fs::write(dir.path().join("bower.json"), "{}").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(change.is_manifest());
    }
}
