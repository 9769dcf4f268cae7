//! Folder watch manager.
//!
//! Owns one `notify` subscription per watched folder. The notify callback
//! only forwards into an unbounded channel; a single consumer task per folder
//! drains it, filters out our own echoes and held renames, debounces the rest
//! and either organizes the batch or reports it upward.
//!
//! Organize and undo runs are single-flight per folder: the folder moves to
//! `Organizing` for the duration and a second run is refused.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use chrono::Utc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::config::{AppConfig, CompiledFilters, Settings, WatchTimings};
use crate::debounce::Debouncer;
use crate::error::{ConfigError, OrganizeError, WatchError, WatchResult};
use crate::event::{ChangeKind, FileChange, FolderEvent, RawChange};
use crate::executor::{OperationLog, OrganizationExecutor, OrganizeReport, collect_files};
use crate::folder::{FolderStatus, WatchedFolder};
use crate::recent::RecentlyOrganized;
use crate::rename_guard::PendingRenames;
use crate::rule_engine::RuleEngine;
use crate::trash::TrashService;
use crate::undo::{UndoManager, UndoReport};

/// Capacity of the upward event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

type RawEvent = notify::Result<notify::Event>;

/// Read-mostly inputs, swapped wholesale on reload.
#[derive(Debug)]
struct Snapshot {
    engine: RuleEngine,
    settings: Settings,
    filters: CompiledFilters,
}

impl Snapshot {
    fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: config.rule_engine(),
            settings: config.settings.clone(),
            filters: config.compile_filters()?,
        })
    }
}

/// A live notify subscription and the tasks feeding off it.
struct Subscription {
    _watcher: RecommendedWatcher,
    debouncer: Debouncer,
    renames: Arc<PendingRenames>,
    consumer: JoinHandle<()>,
}

impl Subscription {
    /// Tears the subscription down. Scheduled flushes become no-ops.
    fn shutdown(self, abort_consumer: bool) {
        self.debouncer.invalidate();
        self.renames.clear();
        if abort_consumer {
            self.consumer.abort();
        }
    }
}

struct FolderState {
    folder: WatchedFolder,
    subscription: Option<Subscription>,
    undo_slot: Option<OperationLog>,
}

impl FolderState {
    fn new(folder: WatchedFolder) -> Self {
        Self {
            folder,
            subscription: None,
            undo_slot: None,
        }
    }
}

struct Inner {
    folders: RwLock<HashMap<String, FolderState>>,
    snapshot: StdRwLock<Arc<Snapshot>>,
    executor: OrganizationExecutor,
    recent: Arc<RecentlyOrganized>,
    timings: WatchTimings,
    events: mpsc::Sender<FolderEvent>,
}

/// Handle to the watch manager. Cheap to clone.
#[derive(Clone)]
pub struct FolderWatchManager {
    inner: Arc<Inner>,
}

impl FolderWatchManager {
    /// Builds a manager from a loaded configuration.
    ///
    /// Folders in `config.folders` are registered but not watched yet.
    /// Returns the receiving end of the upward event channel.
    pub fn new(
        config: &AppConfig,
        trash: Arc<dyn TrashService>,
    ) -> Result<(Self, mpsc::Receiver<FolderEvent>), ConfigError> {
        let timings = config.settings.timings.clone();
        let recent = Arc::new(RecentlyOrganized::new(
            timings.recent_window(),
            timings.recent_purge(),
        ));
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let folders = config
            .folders
            .iter()
            .cloned()
            .map(|mut folder| {
                folder.reset_transient();
                (folder.id.clone(), FolderState::new(folder))
            })
            .collect();

        let inner = Inner {
            folders: RwLock::new(folders),
            snapshot: StdRwLock::new(Arc::new(Snapshot::from_config(config)?)),
            executor: OrganizationExecutor::new(trash, recent.clone()),
            recent,
            timings,
            events,
        };
        Ok((
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        ))
    }

    pub fn recent(&self) -> &Arc<RecentlyOrganized> {
        &self.inner.recent
    }

    /// Swaps in freshly loaded rules, categories, settings and filters.
    ///
    /// Runs already in flight keep the snapshot they started with.
    pub fn update_snapshot(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let snapshot = Arc::new(Snapshot::from_config(config)?);
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot;
        info!(rules = config.rules.len(), "configuration snapshot updated");
        Ok(())
    }

    /// Registers or refreshes folder records without touching subscriptions.
    ///
    /// Runtime state (status, last error, bookkeeping) of known folders is kept.
    pub async fn load_folders(&self, folders: Vec<WatchedFolder>) {
        let mut known = self.inner.folders.write().await;
        for mut folder in folders {
            folder.reset_transient();
            match known.get_mut(&folder.id) {
                Some(state) => {
                    state.folder.folder_path = folder.folder_path;
                    state.folder.profile_id = folder.profile_id;
                    state.folder.is_enabled = folder.is_enabled;
                    state.folder.auto_organize = folder.auto_organize;
                }
                None => {
                    known.insert(folder.id.clone(), FolderState::new(folder));
                }
            }
        }
    }

    pub async fn folder(&self, id: &str) -> Option<WatchedFolder> {
        self.inner
            .folders
            .read()
            .await
            .get(id)
            .map(|s| s.folder.clone())
    }

    /// All known folders, sorted by path.
    pub async fn folders(&self) -> Vec<WatchedFolder> {
        let mut folders: Vec<_> = self
            .inner
            .folders
            .read()
            .await
            .values()
            .map(|s| s.folder.clone())
            .collect();
        folders.sort_by(|a, b| a.folder_path.cmp(&b.folder_path));
        folders
    }

    pub async fn is_watching(&self, id: &str) -> bool {
        self.inner
            .folders
            .read()
            .await
            .get(id)
            .is_some_and(|s| s.subscription.is_some())
    }

    pub async fn has_undo(&self, id: &str) -> bool {
        self.inner
            .folders
            .read()
            .await
            .get(id)
            .is_some_and(|s| s.undo_slot.is_some())
    }

    /// Validates the folder and subscribes to its changes.
    ///
    /// Unknown folders are registered first. Validation or subscribe failures
    /// put the folder into `Error` and are returned.
    pub async fn start_watching(&self, folder: WatchedFolder) -> WatchResult<()> {
        let inner = &self.inner;
        let id = folder.id.clone();
        let mut folders = inner.folders.write().await;
        let state = folders
            .entry(id.clone())
            .or_insert_with(|| FolderState::new(folder));

        if state.subscription.is_some() {
            return Err(WatchError::AlreadyWatching(id));
        }
        if let Err(e) = state.folder.validate() {
            inner.transition(&mut state.folder, FolderStatus::Error, Some(e.to_string()));
            return Err(e);
        }

        let base = state.folder.folder_path.clone();
        match inner.subscribe(&id, &base) {
            Ok(subscription) => {
                state.subscription = Some(subscription);
                if state.folder.status != FolderStatus::Organizing {
                    inner.transition(&mut state.folder, FolderStatus::Watching, None);
                }
                info!(folder_id = %id, path = %base.display(), "watching folder");
                Ok(())
            }
            Err(e) => {
                inner.transition(&mut state.folder, FolderStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Tears the subscription down and discards pending changes.
    ///
    /// An organize run in progress is left to finish on its own.
    pub async fn stop_watching(&self, id: &str) -> WatchResult<()> {
        let inner = &self.inner;
        let mut folders = inner.folders.write().await;
        let state = folders
            .get_mut(id)
            .ok_or_else(|| WatchError::UnknownFolder(id.to_string()))?;

        if let Some(subscription) = state.subscription.take() {
            subscription.shutdown(true);
            info!(folder_id = %id, "stopped watching folder");
        }
        if state.folder.status == FolderStatus::Watching {
            inner.transition(&mut state.folder, FolderStatus::Idle, None);
        }
        Ok(())
    }

    /// Re-validates and subscribes again. This is the way out of `Error`.
    pub async fn restart_watching(&self, id: &str) -> WatchResult<()> {
        let folder = {
            let inner = &self.inner;
            let mut folders = inner.folders.write().await;
            let state = folders
                .get_mut(id)
                .ok_or_else(|| WatchError::UnknownFolder(id.to_string()))?;

            if let Some(subscription) = state.subscription.take() {
                subscription.shutdown(true);
            }
            if state.folder.status == FolderStatus::Error {
                if let Err(e) = state.folder.validate() {
                    inner.transition(&mut state.folder, FolderStatus::Error, Some(e.to_string()));
                    return Err(e);
                }
                inner.transition(&mut state.folder, FolderStatus::Idle, None);
            }
            state.folder.clone()
        };
        self.start_watching(folder).await
    }

    /// Stops every subscription.
    pub async fn shutdown(&self) {
        let mut folders = self.inner.folders.write().await;
        for state in folders.values_mut() {
            if let Some(subscription) = state.subscription.take() {
                subscription.shutdown(true);
            }
            if state.folder.status == FolderStatus::Watching {
                self.inner
                    .transition(&mut state.folder, FolderStatus::Idle, None);
            }
        }
    }

    /// Scans the whole folder and organizes it, or only classifies when
    /// `preview_only` is set.
    pub async fn organize_folder(&self, id: &str, preview_only: bool) -> WatchResult<OrganizeReport> {
        let base = self.inner.begin_organizing(id).await?;
        self.inner
            .organize_started(id, base, None, preview_only)
            .await
    }

    /// Replays the folder's undo slot in reverse.
    ///
    /// The slot is consumed unless some operation failed.
    pub async fn undo_last_organization(&self, id: &str) -> WatchResult<UndoReport> {
        let inner = &self.inner;
        inner.begin_organizing(id).await?;

        let slot = inner
            .folders
            .write()
            .await
            .get_mut(id)
            .and_then(|s| s.undo_slot.take());
        let Some(log) = slot else {
            inner.finish_organizing(id, None, None).await;
            return Err(WatchError::Organize(OrganizeError::NothingToUndo));
        };

        let undo = UndoManager::new().with_recent(inner.recent.clone());
        let joined = tokio::task::spawn_blocking(move || {
            let report = undo.replay(&log);
            (report, log)
        })
        .await;

        match joined {
            Ok((report, log)) => {
                if !report.is_complete_success()
                    && let Some(state) = inner.folders.write().await.get_mut(id)
                {
                    state.undo_slot = Some(log);
                }
                inner.finish_organizing(id, None, None).await;
                info!(folder_id = %id, restored = report.restored, "undo finished");
                Ok(report)
            }
            Err(e) => {
                inner.finish_organizing(id, None, None).await;
                Err(e.into())
            }
        }
    }
}

impl Inner {
    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delivers an event without ever blocking the caller.
    fn emit(&self, event: FolderEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(folder_id = %event.folder_id(), "event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => trace!("event receiver dropped"),
        }
    }

    /// Updates status and last error, and reports the change.
    fn transition(&self, folder: &mut WatchedFolder, status: FolderStatus, error: Option<String>) {
        folder.last_error = if status == FolderStatus::Error {
            error.clone()
        } else {
            None
        };
        let old_status = folder.status;
        if old_status == status {
            return;
        }
        if !old_status.can_transition_to(status) {
            debug!(folder_id = %folder.id, from = %old_status, to = %status, "unusual status transition");
        }
        folder.status = status;
        debug!(folder_id = %folder.id, from = %old_status, to = %status, "folder status changed");
        self.emit(FolderEvent::StatusChanged {
            folder_id: folder.id.clone(),
            old_status,
            new_status: status,
            error,
        });
    }

    /// Moves a folder into `Error` and drops its subscription.
    async fn fail_folder(&self, id: &str, message: String) {
        error!(folder_id = %id, %message, "watcher failed");
        let mut folders = self.folders.write().await;
        if let Some(state) = folders.get_mut(id) {
            self.transition(&mut state.folder, FolderStatus::Error, Some(message));
            if let Some(subscription) = state.subscription.take() {
                subscription.shutdown(false);
            }
        }
    }

    fn subscribe(self: &Arc<Self>, id: &str, base: &Path) -> WatchResult<Subscription> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<RawEvent>();
        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            if raw_tx.send(res).is_err() {
                trace!("folder consumer is gone");
            }
        })?;
        watcher.watch(base, RecursiveMode::Recursive)?;

        let (debouncer, flush_rx) = Debouncer::new(self.timings.debounce());
        let renames = Arc::new(PendingRenames::new());
        let consumer = tokio::spawn(self.clone().consume(
            id.to_string(),
            base.to_path_buf(),
            raw_rx,
            flush_rx,
            debouncer.clone(),
            renames.clone(),
        ));

        Ok(Subscription {
            _watcher: watcher,
            debouncer,
            renames,
            consumer,
        })
    }

    /// The single consumer draining one folder's channels.
    async fn consume(
        self: Arc<Self>,
        id: String,
        base: PathBuf,
        mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
        mut flush_rx: mpsc::UnboundedReceiver<Vec<FileChange>>,
        debouncer: Debouncer,
        renames: Arc<PendingRenames>,
    ) {
        let mut purge = tokio::time::interval(self.timings.recent_purge());
        purge.tick().await;

        loop {
            tokio::select! {
                raw = raw_rx.recv() => match raw {
                    Some(Ok(event)) => {
                        for change in RawChange::from_event(&event) {
                            if matches!(&change, RawChange::Changed(p, ChangeKind::Deleted) if p == &base) {
                                self.fail_folder(&id, format!("folder was removed: {}", base.display())).await;
                                return;
                            }
                            self.on_raw_change(&base, change, &debouncer, &renames);
                        }
                    }
                    Some(Err(e)) => {
                        self.fail_folder(&id, e.to_string()).await;
                        return;
                    }
                    None => return,
                },
                Some(batch) = flush_rx.recv() => {
                    self.on_batch(&id, batch, &debouncer).await;
                }
                _ = purge.tick() => {
                    let purged = self.recent.purge();
                    trace!(purged, "purged recently organized paths");
                    if !base.is_dir() {
                        self.fail_folder(&id, format!("folder is no longer accessible: {}", base.display())).await;
                        return;
                    }
                }
            }
        }
    }

    fn on_raw_change(
        &self,
        base: &Path,
        change: RawChange,
        debouncer: &Debouncer,
        renames: &Arc<PendingRenames>,
    ) {
        let snapshot = self.snapshot();
        let wanted = |path: &Path| {
            if self.recent.is_recent(path) {
                trace!(path = %path.display(), "ignoring our own change");
                return false;
            }
            snapshot.filters.accepts(base, path)
        };

        match change {
            RawChange::Changed(path, kind) => {
                if !wanted(&path) {
                    return;
                }
                if renames.contains(&path) {
                    return;
                }
                if kind == ChangeKind::Created && snapshot.settings.rename_heuristics.inspect(&path) {
                    self.hold_for_rename(path, debouncer, renames);
                    return;
                }
                debouncer.push(FileChange::new(path, kind));
            }
            RawChange::RenamedFrom(path) => {
                if renames.release(&path) {
                    debug!(path = %path.display(), "held file is being renamed");
                } else if wanted(&path) {
                    debouncer.push(FileChange::new(path, ChangeKind::Deleted));
                }
            }
            RawChange::RenamedTo(path) => {
                if wanted(&path) {
                    debouncer.push(FileChange::new(path, ChangeKind::Renamed));
                }
            }
            RawChange::Renamed { from, to } => {
                renames.release(&from);
                if wanted(&to) {
                    debouncer.push(FileChange::new(to, ChangeKind::Renamed));
                }
            }
        }
    }

    fn hold_for_rename(&self, path: PathBuf, debouncer: &Debouncer, renames: &Arc<PendingRenames>) {
        let token = renames.hold(&path);
        debug!(path = %path.display(), "holding new file for a possible rename");

        let renames = renames.clone();
        let debouncer = debouncer.clone();
        let timeout = self.timings.rename_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if renames.expire(&path, token) && path.exists() {
                debug!(path = %path.display(), "rename hold expired");
                debouncer.push(FileChange::new(path, ChangeKind::Created));
            }
        });
    }

    /// Handles a debounced batch: report it, then auto-organize if enabled.
    async fn on_batch(self: &Arc<Self>, id: &str, batch: Vec<FileChange>, debouncer: &Debouncer) {
        let mut by_kind: BTreeMap<ChangeKindKey, Vec<PathBuf>> = BTreeMap::new();
        for change in &batch {
            by_kind
                .entry(ChangeKindKey(change.kind))
                .or_default()
                .push(change.path.clone());
        }
        for (ChangeKindKey(change_kind), affected_paths) in by_kind {
            self.emit(FolderEvent::FolderChanged {
                folder_id: id.to_string(),
                change_kind,
                affected_paths,
            });
        }

        let auto = self
            .folders
            .read()
            .await
            .get(id)
            .is_some_and(|s| s.folder.auto_organize && s.folder.is_enabled);
        if !auto {
            return;
        }

        let candidates: Vec<FileChange> = batch
            .into_iter()
            .filter(|c| c.kind.is_organizable() && c.path.is_file() && !self.recent.is_recent(&c.path))
            .collect();
        if candidates.is_empty() {
            return;
        }

        match self.begin_organizing(id).await {
            Ok(base) => {
                let files: Vec<PathBuf> = candidates.into_iter().map(|c| c.path).collect();
                debug!(folder_id = %id, files = files.len(), "auto-organizing batch");
                let inner = self.clone();
                let id = id.to_string();
                tokio::spawn(async move {
                    if let Err(e) = inner.organize_started(&id, base, Some(files), false).await {
                        warn!(folder_id = %id, error = %e, "auto-organize failed");
                    }
                });
            }
            Err(WatchError::AlreadyOrganizing(_)) => {
                debug!(folder_id = %id, "folder busy, requeueing batch");
                debouncer.requeue(candidates);
            }
            Err(e) => warn!(folder_id = %id, error = %e, "cannot auto-organize"),
        }
    }

    /// Claims the folder for a run. Returns its base path.
    async fn begin_organizing(&self, id: &str) -> WatchResult<PathBuf> {
        let mut folders = self.folders.write().await;
        let state = folders
            .get_mut(id)
            .ok_or_else(|| WatchError::UnknownFolder(id.to_string()))?;

        if state.folder.status == FolderStatus::Organizing {
            return Err(WatchError::AlreadyOrganizing(id.to_string()));
        }
        if let Err(e) = state.folder.validate() {
            self.transition(&mut state.folder, FolderStatus::Error, Some(e.to_string()));
            if let Some(subscription) = state.subscription.take() {
                subscription.shutdown(true);
            }
            return Err(e);
        }

        self.transition(&mut state.folder, FolderStatus::Organizing, None);
        Ok(state.folder.folder_path.clone())
    }

    /// Releases the folder after a run and updates its bookkeeping.
    async fn finish_organizing(&self, id: &str, report: Option<&OrganizeReport>, scanned: Option<usize>) {
        let mut folders = self.folders.write().await;
        let Some(state) = folders.get_mut(id) else {
            return;
        };

        if let Some(report) = report
            && !report.preview
        {
            state.folder.last_organized_at = Some(Utc::now());
            if !report.log.is_empty() {
                state.undo_slot = Some(report.log.clone());
            }
        }
        if let Some(count) = scanned {
            state.folder.file_count = count;
        }

        if state.folder.status == FolderStatus::Organizing {
            let next = if state.subscription.is_some() {
                FolderStatus::Watching
            } else {
                FolderStatus::Idle
            };
            self.transition(&mut state.folder, next, None);
        }
    }

    /// Runs an organize pass for a folder already claimed by `begin_organizing`.
    ///
    /// `files = None` means a full recursive scan.
    async fn organize_started(
        &self,
        id: &str,
        base: PathBuf,
        files: Option<Vec<PathBuf>>,
        preview: bool,
    ) -> WatchResult<OrganizeReport> {
        let snapshot = self.snapshot();
        let executor = self.executor.clone();
        let full_scan = files.is_none();

        let joined = tokio::task::spawn_blocking(move || {
            let (files, mut errors) = match files {
                Some(files) => (files, Vec::new()),
                None => collect_files(&base, &snapshot.filters),
            };
            let mut report = executor.run(&files, &base, &snapshot.engine, &snapshot.settings, preview);
            errors.append(&mut report.errors);
            report.errors = errors;
            (report, files.len())
        })
        .await;

        match joined {
            Ok((report, scanned)) => {
                self.finish_organizing(id, Some(&report), full_scan.then_some(scanned))
                    .await;
                if !preview {
                    self.emit(FolderEvent::OrganizationCompleted {
                        folder_id: id.to_string(),
                        files_moved: report.files_moved,
                        files_skipped: report.files_skipped,
                        errors: report.errors.clone(),
                    });
                }
                Ok(report)
            }
            Err(e) => {
                self.finish_organizing(id, None, None).await;
                Err(e.into())
            }
        }
    }
}

/// Orders change kinds so grouped events come out deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChangeKindKey(ChangeKind);

impl ChangeKindKey {
    fn rank(self) -> u8 {
        match self.0 {
            ChangeKind::Created => 0,
            ChangeKind::Modified => 1,
            ChangeKind::Renamed => 2,
            ChangeKind::Deleted => 3,
            ChangeKind::Other => 4,
        }
    }
}

impl PartialOrd for ChangeKindKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChangeKindKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trash::DirectoryTrash;
    use std::fs;
    use tempfile::TempDir;

    fn manager(temp_dir: &TempDir) -> (FolderWatchManager, mpsc::Receiver<FolderEvent>) {
        let trash = Arc::new(DirectoryTrash::new(temp_dir.path().join(".trash")));
        FolderWatchManager::new(&AppConfig::default(), trash).expect("valid config")
    }

    fn drain(rx: &mut mpsc::Receiver<FolderEvent>) -> Vec<FolderEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_start_watching_rejects_relative_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, mut rx) = manager(&temp_dir);
        let folder = WatchedFolder::new("relative/dir").with_id("f1");

        let result = manager.start_watching(folder).await;
        assert!(matches!(result, Err(WatchError::NotAbsolute(_))));

        let folder = manager.folder("f1").await.expect("registered");
        assert_eq!(folder.status, FolderStatus::Error);
        assert!(folder.last_error.is_some());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [FolderEvent::StatusChanged { new_status: FolderStatus::Error, .. }]
        ));
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watched = temp_dir.path().join("inbox");
        fs::create_dir(&watched).expect("mkdir");
        let (manager, mut rx) = manager(&temp_dir);

        manager
            .start_watching(WatchedFolder::new(&watched).with_id("f1"))
            .await
            .expect("start");
        assert!(manager.is_watching("f1").await);
        assert!(matches!(
            manager
                .start_watching(WatchedFolder::new(&watched).with_id("f1"))
                .await,
            Err(WatchError::AlreadyWatching(_))
        ));

        manager.stop_watching("f1").await.expect("stop");
        assert!(!manager.is_watching("f1").await);

        let statuses: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                FolderEvent::StatusChanged { new_status, .. } => Some(new_status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![FolderStatus::Watching, FolderStatus::Idle]);
    }

    #[tokio::test]
    async fn test_unknown_folder_commands() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let (manager, _rx) = manager(&temp_dir);
        assert!(matches!(
            manager.stop_watching("nope").await,
            Err(WatchError::UnknownFolder(_))
        ));
        assert!(matches!(
            manager.organize_folder("nope", true).await,
            Err(WatchError::UnknownFolder(_))
        ));
    }

    #[tokio::test]
    async fn test_restart_from_error_goes_through_idle() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watched = temp_dir.path().join("later");
        let (manager, mut rx) = manager(&temp_dir);

        let folder = WatchedFolder::new(&watched).with_id("f1");
        assert!(manager.start_watching(folder).await.is_err());
        fs::create_dir(&watched).expect("mkdir");
        drain(&mut rx);

        manager.restart_watching("f1").await.expect("restart");
        let transitions: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                FolderEvent::StatusChanged {
                    old_status,
                    new_status,
                    ..
                } => Some((old_status, new_status)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (FolderStatus::Error, FolderStatus::Idle),
                (FolderStatus::Idle, FolderStatus::Watching),
            ]
        );
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_organize_preview_and_undo_slot() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watched = temp_dir.path().join("inbox");
        fs::create_dir(&watched).expect("mkdir");
        fs::write(watched.join("notes.txt"), "n").expect("write");
        let (manager, mut rx) = manager(&temp_dir);
        manager
            .load_folders(vec![WatchedFolder::new(&watched).with_id("f1")])
            .await;

        let preview = manager.organize_folder("f1", true).await.expect("preview");
        assert_eq!(preview.planned().count(), 1);
        assert!(watched.join("notes.txt").exists());
        assert!(!manager.has_undo("f1").await);

        let report = manager.organize_folder("f1", false).await.expect("organize");
        assert_eq!(report.files_moved, 1);
        assert!(watched.join("Documents").join("notes.txt").exists());
        let folder = manager.folder("f1").await.expect("known");
        assert_eq!(folder.status, FolderStatus::Idle);
        assert_eq!(folder.file_count, 1);
        assert!(folder.last_organized_at.is_some());
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            FolderEvent::OrganizationCompleted { files_moved: 1, .. }
        )));

        let undo = manager.undo_last_organization("f1").await.expect("undo");
        assert_eq!(undo.restored, 1);
        assert!(watched.join("notes.txt").exists());
        assert!(!manager.has_undo("f1").await);
        assert!(matches!(
            manager.undo_last_organization("f1").await,
            Err(WatchError::Organize(OrganizeError::NothingToUndo))
        ));
    }

    #[test]
    fn test_change_kind_key_order() {
        let mut keys = vec![
            ChangeKindKey(ChangeKind::Deleted),
            ChangeKindKey(ChangeKind::Created),
            ChangeKindKey(ChangeKind::Renamed),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ChangeKindKey(ChangeKind::Created),
                ChangeKindKey(ChangeKind::Renamed),
                ChangeKindKey(ChangeKind::Deleted),
            ]
        );
    }
}
