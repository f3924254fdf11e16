//! Project coordinator.
//!
//! Owns one project's graph, manifest and status. Every operation that
//! touches the installer or rewrites the manifest runs as a task on the
//! command queue; tasks that write the manifest bracket the write with the
//! change gate so the write's own file event does not trigger a rebuild
//! mid-task. Closing the project or switching the active path bumps an
//! epoch. A task reads the epoch when it starts; one still running when
//! the epoch moves finishes, but its graph delta is dropped.

use depsync_core::fs::FileAccess;
use depsync_core::paths;
use depsync_core::pkg::{
    default_range, AddOutcome, DependencyKind, EntryUpdate, InstalledSet, ManifestDeps,
    ManifestDocument, ManifestEntry, PackageGraph, PackageInfo, PackageNode, PackageSpec,
    PackagesSummary, SearchHit, Settings, SyncError, SyncStatus,
};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::events::{ProjectChange, ProjectEvent, DEFAULT_EVENT_CAPACITY};
use crate::executor::{ToolConfig, ToolExecutor};
use crate::gate::ChangeGate;
use crate::queue::{CommandQueue, QueueError};

/// Coordinator construction options.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// User-level rc file applied before the project's own.
    pub user_rc: Option<PathBuf>,
    /// Broadcast buffer size for notifications.
    pub event_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            user_rc: paths::user_rc_path(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CoordinatorOptions {
    /// Options that ignore the user-level rc file.
    #[must_use]
    pub fn without_user_rc() -> Self {
        Self {
            user_rc: None,
            ..Self::default()
        }
    }
}

/// Options for `install`.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Range used for every spec that names none.
    pub version: Option<String>,
    /// Declare the installed packages in `dependencies`.
    pub save: bool,
    /// Declare the installed packages in `devDependencies`.
    pub save_dev: bool,
}

/// Options for `update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// New manifest range; rolled back if the update fails.
    pub version: Option<String>,
}

/// What `sync_with_manifest` changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub removed: Vec<String>,
    pub installed: Vec<String>,
    pub updated: Vec<String>,
}

enum ManifestState {
    Absent,
    /// Unreadable or invalid; carries the error manifest operations return.
    Malformed(SyncError),
    Loaded(ManifestDocument),
}

impl ManifestState {
    async fn load(fs: &Arc<dyn FileAccess>, dir: &Path) -> Self {
        let path = paths::manifest_path(dir);
        if !fs.exists(&path).await {
            return Self::Absent;
        }
        match ManifestDocument::load(fs.clone(), &path).await {
            Ok(doc) => Self::Loaded(doc),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Manifest unusable");
                Self::Malformed(e)
            }
        }
    }

    fn deps(&self) -> Option<&ManifestDeps> {
        match self {
            Self::Loaded(doc) => Some(doc.deps()),
            Self::Absent | Self::Malformed(_) => None,
        }
    }

    fn check(&self, dir: &Path) -> Result<(), SyncError> {
        match self {
            Self::Loaded(_) => Ok(()),
            Self::Malformed(e) => Err(e.clone()),
            Self::Absent => Err(SyncError::NoManifest {
                root: dir.to_path_buf(),
            }),
        }
    }

    fn require(&mut self, dir: &Path) -> Result<&mut ManifestDocument, SyncError> {
        match self {
            Self::Loaded(doc) => Ok(doc),
            Self::Malformed(e) => Err(e.clone()),
            Self::Absent => Err(SyncError::NoManifest {
                root: dir.to_path_buf(),
            }),
        }
    }

    fn entry(&self, name: &str) -> Option<ManifestEntry> {
        match self {
            Self::Loaded(doc) => doc.entry(name),
            Self::Absent | Self::Malformed(_) => None,
        }
    }

    fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Malformed(e) => Some(e),
            Self::Absent | Self::Loaded(_) => None,
        }
    }

    /// Whether replacing `self` with `fresh` changes what the graph sees.
    fn differs(&self, fresh: &Self) -> bool {
        match (self, fresh) {
            (Self::Loaded(old), Self::Loaded(new)) => old.detect_external_change(new.deps()),
            (Self::Absent, Self::Absent) | (Self::Malformed(_), Self::Malformed(_)) => false,
            _ => true,
        }
    }
}

struct Project {
    root: PathBuf,
    active: PathBuf,
    settings: Settings,
    manifest: ManifestState,
    graph: PackageGraph,
    status: SyncStatus,
}

impl Project {
    fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            cwd: self.active.clone(),
            directory: self.settings.directory.clone(),
        }
    }

    /// Recompute status; returns the new status if it changed.
    fn recompute(&mut self) -> Option<SyncStatus> {
        let status = SyncStatus::compute(&self.graph, self.manifest.deps());
        if status == self.status {
            None
        } else {
            self.status = status.clone();
            Some(status)
        }
    }

    fn nodes_from(&self, set: &InstalledSet) -> Vec<PackageNode> {
        set.iter()
            .map(|(name, raw)| PackageNode::from_raw(name, raw, self.manifest.deps()))
            .collect()
    }

    fn installed_node(&self, name: &str) -> Result<&PackageNode, SyncError> {
        self.graph
            .get(name)
            .filter(|n| n.is_installed())
            .ok_or_else(|| SyncError::not_installed(name))
    }
}

/// Names touched by one operation.
#[derive(Default)]
struct Delta {
    added: Vec<String>,
    removed: Vec<String>,
    updated: Vec<String>,
}

impl From<AddOutcome> for Delta {
    fn from(outcome: AddOutcome) -> Self {
        Self {
            added: outcome.installed,
            updated: outcome.updated,
            removed: Vec::new(),
        }
    }
}

/// Captured when a queued task starts running.
#[derive(Clone)]
struct Ticket {
    epoch: u64,
    config: ToolConfig,
}

struct Inner {
    this: Weak<Inner>,
    executor: Arc<dyn ToolExecutor>,
    fs: Arc<dyn FileAccess>,
    options: CoordinatorOptions,
    state: Mutex<Project>,
    gate: ChangeGate,
    queue: CommandQueue,
    events: broadcast::Sender<ProjectEvent>,
    epoch: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }

    async fn ticket(&self) -> Ticket {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let config = self.state.lock().await.tool_config();
        Ticket { epoch, config }
    }

    /// Queue a refresh of the active project without waiting for it.
    fn queue_refresh(&self) {
        let Some(inner) = self.this.upgrade() else {
            return;
        };
        let epoch = self.epoch.load(Ordering::SeqCst);
        let _ = self.queue.submit(async move {
            if let Err(e) = inner.refresh(epoch).await {
                warn!(error = %e, "Deferred rebuild failed");
            }
        });
    }

    fn stale(ticket: &Ticket) -> SyncError {
        SyncError::NoProject {
            path: ticket.config.cwd.clone(),
        }
    }

    fn emit(&self, event: ProjectEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            trace!(event = name, "No subscribers");
        }
    }

    /// Re-classify against the manifest, recompute status, and notify.
    fn publish(&self, project: &mut Project, delta: Delta) {
        project.graph.apply_manifest(project.manifest.deps());
        let status = project.recompute();

        if !delta.removed.is_empty() {
            self.emit(ProjectEvent::DependenciesRemoved {
                names: delta.removed,
            });
        }
        if !delta.added.is_empty() {
            self.emit(ProjectEvent::DependenciesAdded { names: delta.added });
        }
        if !delta.updated.is_empty() {
            self.emit(ProjectEvent::DependenciesUpdated {
                names: delta.updated,
            });
        }
        if let Some(status) = status {
            self.emit(ProjectEvent::StatusChanged { status });
        }
    }

    /// Run `work` with change processing suppressed, then run the one
    /// rebuild owed for any changes seen meanwhile.
    async fn gated<T>(
        &self,
        epoch: u64,
        work: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        let guard = GateGuard::disable(self);
        let result = work.await;
        if guard.release() {
            debug!("Running rebuild deferred during internal write");
            if let Err(e) = self.refresh(epoch).await {
                warn!(error = %e, "Deferred rebuild failed");
            }
        }
        result
    }

    /// Rebuild the graph from the installer's tree.
    async fn resync(&self, epoch: u64) -> Result<(), SyncError> {
        let config = self.state.lock().await.tool_config();
        let tree = self.executor.list(&config).await?;

        let mut project = self.state.lock().await;
        if !self.is_current(epoch) {
            debug!("Discarding stale resync");
            return Ok(());
        }
        let graph = PackageGraph::build_from_installed_tree(&tree, project.manifest.deps());
        project.graph = graph;
        if let Some(status) = project.recompute() {
            self.emit(ProjectEvent::StatusChanged { status });
        }
        debug!(packages = project.graph.len(), "Graph rebuilt");
        Ok(())
    }

    /// Re-read settings and manifest; resync if either changed.
    async fn refresh(&self, epoch: u64) -> Result<(), SyncError> {
        let active = self.state.lock().await.active.clone();
        let settings =
            Settings::load(self.fs.as_ref(), &active, self.options.user_rc.as_deref()).await;
        let manifest = ManifestState::load(&self.fs, &active).await;

        let changed = {
            let mut project = self.state.lock().await;
            if !self.is_current(epoch) {
                return Ok(());
            }
            let changed = project.settings != settings || project.manifest.differs(&manifest);
            project.settings = settings;
            project.manifest = manifest;
            changed
        };

        if changed {
            info!(path = %active.display(), "Project files changed, resyncing");
            self.resync(epoch).await
        } else {
            debug!(path = %active.display(), "No effective project file change");
            Ok(())
        }
    }

    async fn install(
        &self,
        ticket: Ticket,
        specs: Vec<PackageSpec>,
        options: InstallOptions,
    ) -> Result<AddOutcome, SyncError> {
        let save = options.save || options.save_dev;
        if save {
            let project = self.state.lock().await;
            project.manifest.check(&project.active)?;
        }

        self.gated(ticket.epoch, async {
            let installed = self.executor.install(&ticket.config, &specs).await?;

            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                debug!("Discarding stale install result");
                return Ok(AddOutcome {
                    installed: installed.keys().cloned().collect(),
                    updated: Vec::new(),
                });
            }
            let project = &mut *guard;

            let nodes = project.nodes_from(&installed);
            let outcome = project.graph.add_packages(nodes);

            let saved = if save {
                save_entries(project, &specs, &installed, !options.save_dev).await
            } else {
                Ok(())
            };

            info!(
                installed = outcome.installed.len(),
                updated = outcome.updated.len(),
                "Install complete"
            );
            self.publish(project, outcome.clone().into());
            saved.map(|()| outcome)
        })
        .await
    }

    async fn uninstall(&self, ticket: Ticket, name: String, force: bool) -> Result<Vec<String>, SyncError> {
        {
            let project = self.state.lock().await;
            let node = project.installed_node(&name)?;
            if !force && !node.dependants.is_empty() {
                return Err(SyncError::Conflict {
                    name,
                    dependants: node.dependants.iter().cloned().collect(),
                });
            }
        }

        self.gated(ticket.epoch, async {
            let removed = self
                .executor
                .uninstall(&ticket.config, &[name.clone()], force)
                .await?;

            let mut project = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                debug!("Discarding stale uninstall result");
                return Ok(removed);
            }
            project.graph.remove_packages(&removed);
            info!(name = %name, removed = removed.len(), "Uninstall complete");
            self.publish(
                &mut project,
                Delta {
                    removed: removed.clone(),
                    ..Delta::default()
                },
            );
            Ok(removed)
        })
        .await
    }

    async fn update(
        &self,
        ticket: Ticket,
        name: String,
        options: UpdateOptions,
    ) -> Result<AddOutcome, SyncError> {
        let captured = {
            let project = self.state.lock().await;
            project.installed_node(&name)?;
            project.manifest.entry(&name)
        };

        self.gated(ticket.epoch, async {
            // Declared packages take the new range through the manifest so the
            // installer resolves against it; the write is undone on failure.
            let mut speculative = None;
            if let (Some(version), Some(entry)) = (&options.version, &captured) {
                let mut project = self.state.lock().await;
                let active = project.active.clone();
                project
                    .manifest
                    .require(&active)?
                    .update_entry(&name, Some(&EntryUpdate::version(version.clone())))
                    .await?;
                speculative = Some(entry.clone());
            }

            let result = if options.version.is_some() && speculative.is_none() {
                let spec = PackageSpec::new(name.clone(), options.version.clone());
                self.executor.install(&ticket.config, &[spec]).await
            } else {
                self.executor.update(&ticket.config, &[name.clone()]).await
            };

            let updated = match result {
                Ok(set) => set,
                Err(e) => {
                    if let Some(entry) = speculative {
                        self.roll_back(&name, &entry).await;
                    }
                    return Err(e);
                }
            };

            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                debug!("Discarding stale update result");
                return Ok(AddOutcome {
                    installed: Vec::new(),
                    updated: updated.keys().cloned().collect(),
                });
            }
            let project = &mut *guard;
            let nodes = project.nodes_from(&updated);
            let outcome = project.graph.add_packages(nodes);
            info!(name = %name, updated = outcome.updated.len(), "Update complete");
            self.publish(project, outcome.clone().into());
            Ok(outcome)
        })
        .await
    }

    async fn roll_back(&self, name: &str, entry: &ManifestEntry) {
        let mut project = self.state.lock().await;
        let active = project.active.clone();
        let restored = match project.manifest.require(&active) {
            Ok(doc) => {
                doc.update_entry(name, Some(&EntryUpdate::restoring(entry)))
                    .await
            }
            Err(e) => Err(e),
        };
        match restored {
            Ok(()) => debug!(name = %name, "Rolled back manifest entry"),
            Err(e) => error!(name = %name, error = %e, "Failed to roll back manifest entry"),
        }
    }

    async fn prune(&self, ticket: Ticket) -> Result<Vec<String>, SyncError> {
        self.gated(ticket.epoch, async {
            let removed = self.executor.prune(&ticket.config).await?;

            let mut project = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                return Ok(removed);
            }
            project.graph.remove_packages(&removed);
            info!(removed = removed.len(), "Prune complete");
            self.publish(
                &mut project,
                Delta {
                    removed: removed.clone(),
                    ..Delta::default()
                },
            );
            Ok(removed)
        })
        .await
    }

    async fn sync_with_manifest(&self, ticket: Ticket) -> Result<SyncReport, SyncError> {
        let (untracked, to_install) = {
            let project = self.state.lock().await;
            if project.status.is_synced() {
                return Err(SyncError::NothingToSync);
            }
            let untracked: Vec<String> = project.status.untracked.iter().cloned().collect();
            let to_install: Vec<PackageSpec> = project
                .status
                .missing
                .iter()
                .chain(&project.status.version_out_of_sync)
                .map(|name| {
                    let range = project.graph.get(name).and_then(|n| n.manifest_range.clone());
                    PackageSpec::new(name.clone(), range)
                })
                .collect();
            (untracked, to_install)
        };

        self.gated(ticket.epoch, async {
            let removed = if untracked.is_empty() {
                Vec::new()
            } else {
                self.executor
                    .uninstall(&ticket.config, &untracked, true)
                    .await?
            };

            let installed = if to_install.is_empty() {
                Ok(InstalledSet::new())
            } else {
                self.executor.install(&ticket.config, &to_install).await
            };

            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                let installed = installed?;
                return Ok(SyncReport {
                    removed,
                    installed: installed.keys().cloned().collect(),
                    updated: Vec::new(),
                });
            }
            let project = &mut *guard;
            project.graph.remove_packages(&removed);

            // Removals already happened on disk even if the install failed.
            let installed = match installed {
                Ok(set) => set,
                Err(e) => {
                    self.publish(
                        project,
                        Delta {
                            removed,
                            ..Delta::default()
                        },
                    );
                    return Err(e);
                }
            };

            let nodes = project.nodes_from(&installed);
            let outcome = project.graph.add_packages(nodes);
            let report = SyncReport {
                removed: removed.clone(),
                installed: outcome.installed.clone(),
                updated: outcome.updated.clone(),
            };
            info!(
                removed = report.removed.len(),
                installed = report.installed.len(),
                updated = report.updated.len(),
                "Synced installed packages with manifest"
            );
            let mut delta = Delta::from(outcome);
            delta.removed = removed;
            self.publish(project, delta);
            Ok(report)
        })
        .await
    }

    async fn sync_with_installed_state(&self, ticket: Ticket) -> Result<(), SyncError> {
        self.gated(ticket.epoch, async {
            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                return Err(Self::stale(&ticket));
            }
            let project = &mut *guard;
            let reconciliation = project.status.reconciliation(&project.graph);
            project
                .manifest
                .require(&project.active)?
                .sync_with_status(&reconciliation)
                .await?;
            info!("Manifest rewritten from installed state");
            self.publish(project, Delta::default());
            Ok(())
        })
        .await
    }

    async fn track(&self, ticket: Ticket, name: String, kind: DependencyKind) -> Result<(), SyncError> {
        self.gated(ticket.epoch, async {
            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                return Err(Self::stale(&ticket));
            }
            let project = &mut *guard;
            project.manifest.check(&project.active)?;

            let version = project
                .installed_node(&name)?
                .installed_version
                .clone()
                .unwrap_or_else(|| "*".to_string());
            let kind = match kind {
                DependencyKind::Development => DependencyKind::Development,
                DependencyKind::Production | DependencyKind::Unknown => DependencyKind::Production,
            };

            let doc = project.manifest.require(&project.active)?;
            match doc.entry(&name) {
                Some(entry) if entry.kind == kind => {
                    debug!(name = %name, "Already tracked");
                }
                Some(_) => {
                    doc.update_entry(&name, Some(&EntryUpdate::kind(kind))).await?;
                }
                None => {
                    doc.add_entry(&name, &default_range(&version), kind == DependencyKind::Production)
                        .await?;
                }
            }

            info!(name = %name, kind = %kind, "Tracking package");
            self.publish(project, Delta::default());
            Ok(())
        })
        .await
    }

    async fn untrack(&self, ticket: Ticket, name: String) -> Result<(), SyncError> {
        self.gated(ticket.epoch, async {
            let mut guard = self.state.lock().await;
            if !self.is_current(ticket.epoch) {
                return Err(Self::stale(&ticket));
            }
            let project = &mut *guard;
            project.manifest.check(&project.active)?;
            project.installed_node(&name)?;

            project
                .manifest
                .require(&project.active)?
                .remove_entry(&name)
                .await?;

            info!(name = %name, "Untracking package");
            self.publish(project, Delta::default());
            Ok(())
        })
        .await
    }

    async fn set_active_path(&self, ticket: Ticket, dir: PathBuf) -> Result<PathBuf, SyncError> {
        if !self.is_current(ticket.epoch) {
            return Err(Self::stale(&ticket));
        }

        let target = {
            let project = self.state.lock().await;
            if dir.is_absolute() {
                dir
            } else {
                project.root.join(dir)
            }
        };
        if !self.fs.is_dir(&target).await {
            return Err(SyncError::NoProject { path: target });
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let settings =
            Settings::load(self.fs.as_ref(), &target, self.options.user_rc.as_deref()).await;
        let manifest = ManifestState::load(&self.fs, &target).await;
        {
            let mut project = self.state.lock().await;
            project.active.clone_from(&target);
            project.settings = settings;
            project.manifest = manifest;
            project.graph = PackageGraph::new();
            project.status = SyncStatus::default();
        }

        info!(path = %target.display(), "Active path changed");
        self.emit(ProjectEvent::ActivePathChanged {
            path: target.clone(),
        });
        self.resync(epoch).await?;
        Ok(target)
    }
}

/// Keeps change processing suppressed while alive.
///
/// Dropping the guard without `release` (a panicking task) re-enables
/// processing and queues the rebuild owed for changes seen meanwhile.
struct GateGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl<'a> GateGuard<'a> {
    fn disable(inner: &'a Inner) -> Self {
        inner.gate.disable();
        Self { inner, armed: true }
    }

    /// Re-enable processing. True when a rebuild is owed.
    fn release(mut self) -> bool {
        self.armed = false;
        self.inner.gate.enable()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.inner.gate.enable() {
            warn!("Queueing rebuild deferred by an interrupted write");
            self.inner.queue_refresh();
        }
    }
}

/// Declare every requested spec in the manifest with a single write.
async fn save_entries(
    project: &mut Project,
    specs: &[PackageSpec],
    installed: &InstalledSet,
    production: bool,
) -> Result<(), SyncError> {
    let entries: Vec<(String, String)> = specs
        .iter()
        .map(|spec| {
            let range = spec.range.clone().unwrap_or_else(|| {
                let version = installed
                    .get(&spec.name)
                    .and_then(|raw| raw.pkg_meta.version.as_deref())
                    .unwrap_or("*");
                default_range(version)
            });
            (spec.name.clone(), range)
        })
        .collect();
    project
        .manifest
        .require(&project.active)?
        .add_entries(&entries, production)
        .await
}

/// Coordinates one project's dependency state.
#[derive(Clone)]
pub struct ProjectCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for ProjectCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectCoordinator")
            .field("epoch", &self.inner.epoch.load(Ordering::SeqCst))
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl ProjectCoordinator {
    /// Open a project and build its graph.
    pub async fn open(
        root: impl Into<PathBuf>,
        executor: Arc<dyn ToolExecutor>,
        fs: Arc<dyn FileAccess>,
        options: CoordinatorOptions,
    ) -> Result<Self, SyncError> {
        let root = root.into();
        if !fs.is_dir(&root).await {
            return Err(SyncError::NoProject { path: root });
        }

        let settings = Settings::load(fs.as_ref(), &root, options.user_rc.as_deref()).await;
        let manifest = ManifestState::load(&fs, &root).await;
        let (events, _) = broadcast::channel(options.event_capacity.max(1));

        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            executor,
            fs,
            options,
            state: Mutex::new(Project {
                root: root.clone(),
                active: root.clone(),
                settings,
                manifest,
                graph: PackageGraph::new(),
                status: SyncStatus::default(),
            }),
            gate: ChangeGate::new(),
            queue: CommandQueue::new(),
            events,
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });

        let coordinator = Self { inner };
        coordinator.rebuild().await?;
        info!(root = %root.display(), "Project opened");
        Ok(coordinator)
    }

    /// Submit a task. Its ticket is taken when it starts, so work queued
    /// behind a path switch runs against the new active project.
    async fn run_queued<F, Fut, T>(&self, task: F) -> Result<T, SyncError>
    where
        F: FnOnce(Arc<Inner>, Ticket) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SyncError>> + Send + 'static,
        T: Send + 'static,
    {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SyncError::QueueClosed);
        }

        let inner = self.inner.clone();
        let job = async move {
            let ticket = inner.ticket().await;
            task(inner, ticket).await
        };

        match self.inner.queue.submit(job).join().await {
            Ok(result) => result,
            Err(QueueError::Closed) => Err(SyncError::QueueClosed),
            Err(QueueError::Panicked(message)) => Err(SyncError::tool(None, message)),
        }
    }

    /// Receive notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.inner.events.subscribe()
    }

    /// Declare an installed package in the manifest.
    pub async fn track_package(&self, name: &str, kind: DependencyKind) -> Result<(), SyncError> {
        let name = name.to_string();
        self.run_queued(move |inner, ticket| async move { inner.track(ticket, name, kind).await })
            .await
    }

    /// Remove an installed package's declaration.
    pub async fn untrack_package(&self, name: &str) -> Result<(), SyncError> {
        let name = name.to_string();
        self.run_queued(move |inner, ticket| async move { inner.untrack(ticket, name).await })
            .await
    }

    /// Make the installed packages match the manifest.
    ///
    /// Untracked packages are uninstalled, then missing and out-of-sync
    /// packages are installed at their manifest ranges.
    pub async fn sync_with_manifest(&self) -> Result<SyncReport, SyncError> {
        self.run_queued(|inner, ticket| async move { inner.sync_with_manifest(ticket).await })
            .await
    }

    /// Make the manifest match the installed packages.
    pub async fn sync_with_installed_state(&self) -> Result<(), SyncError> {
        self.run_queued(|inner, ticket| async move { inner.sync_with_installed_state(ticket).await })
            .await
    }

    /// Install packages.
    pub async fn install(
        &self,
        names: &[String],
        options: InstallOptions,
    ) -> Result<AddOutcome, SyncError> {
        let specs = names
            .iter()
            .map(|n| {
                let mut spec = PackageSpec::parse(n)?;
                if spec.range.is_none() {
                    spec.range.clone_from(&options.version);
                }
                Ok(spec)
            })
            .collect::<Result<Vec<_>, SyncError>>()?;
        if specs.is_empty() {
            return Err(SyncError::invalid_spec("No packages to install"));
        }

        self.run_queued(move |inner, ticket| async move { inner.install(ticket, specs, options).await })
            .await
    }

    /// Uninstall a package. Without `force`, refuses while others depend on it.
    pub async fn uninstall(&self, name: &str, force: bool) -> Result<Vec<String>, SyncError> {
        let name = name.to_string();
        self.run_queued(move |inner, ticket| async move { inner.uninstall(ticket, name, force).await })
            .await
    }

    /// Update a package, optionally to a new range.
    pub async fn update(&self, name: &str, options: UpdateOptions) -> Result<AddOutcome, SyncError> {
        let name = name.to_string();
        self.run_queued(move |inner, ticket| async move { inner.update(ticket, name, options).await })
            .await
    }

    /// Remove extraneous packages.
    pub async fn prune(&self) -> Result<Vec<String>, SyncError> {
        self.run_queued(|inner, ticket| async move { inner.prune(ticket).await })
            .await
    }

    /// Search the registry.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SyncError> {
        let config = self.inner.state.lock().await.tool_config();
        self.inner.executor.search(&config, query).await
    }

    /// Registry information for a package; records its latest version.
    pub async fn info(&self, name: &str) -> Result<PackageInfo, SyncError> {
        let config = self.inner.state.lock().await.tool_config();
        let info = self.inner.executor.info(&config, name).await?;

        let mut project = self.inner.state.lock().await;
        project
            .graph
            .set_latest_known_version(name, info.latest_version().map(str::to_string));
        Ok(info)
    }

    /// Full resync from the installer's tree.
    pub async fn rebuild(&self) -> Result<(), SyncError> {
        self.run_queued(|inner, ticket| async move { inner.resync(ticket.epoch).await })
            .await
    }

    /// Switch to another directory's manifest. Relative paths are resolved
    /// against the project root.
    pub async fn set_active_path(&self, dir: impl Into<PathBuf>) -> Result<PathBuf, SyncError> {
        let dir = dir.into();
        self.run_queued(move |inner, ticket| async move { inner.set_active_path(ticket, dir).await })
            .await
    }

    /// React to a change of the manifest or rc file on disk.
    pub async fn handle_change(&self, change: ProjectChange) -> Result<(), SyncError> {
        debug!(change = %change, "Project file change");
        if !self.inner.gate.notify_possible_change() {
            debug!(change = %change, "Deferring rebuild until internal write completes");
            return Ok(());
        }
        self.run_queued(|inner, ticket| async move { inner.refresh(ticket.epoch).await })
            .await
    }

    /// Close the project. Results of tasks still queued are discarded.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        info!("Project closed");
    }

    /// All packages in name order.
    pub async fn packages(&self) -> Vec<PackageNode> {
        self.inner.state.lock().await.graph.iter().cloned().collect()
    }

    pub async fn package(&self, name: &str) -> Option<PackageNode> {
        self.inner.state.lock().await.graph.get(name).cloned()
    }

    pub async fn packages_summary(&self) -> PackagesSummary {
        self.inner.state.lock().await.graph.summary()
    }

    pub async fn status(&self) -> SyncStatus {
        self.inner.state.lock().await.status.clone()
    }

    /// Declared sections, if the manifest is present and valid.
    pub async fn manifest_deps(&self) -> Option<ManifestDeps> {
        self.inner.state.lock().await.manifest.deps().cloned()
    }

    /// Why the manifest is unusable, if it is.
    pub async fn manifest_error(&self) -> Option<SyncError> {
        self.inner.state.lock().await.manifest.error().cloned()
    }

    /// Active project directory.
    pub async fn root(&self) -> PathBuf {
        self.inner.state.lock().await.active.clone()
    }

    pub async fn settings(&self) -> Settings {
        self.inner.state.lock().await.settings.clone()
    }
}
