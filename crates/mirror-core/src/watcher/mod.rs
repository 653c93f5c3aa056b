//! Debounced filesystem watcher driving incremental sync
//!
//! Raw notifications for paths inside auto-sync groups land in one of two
//! deadline tables, pending creates and pending deletes. Each table has a
//! single worker thread that sleeps until the earliest deadline, flushes
//! everything due, and sleeps again. A repeated event for a pending path
//! pushes its deadline back, so the action runs once, one debounce period
//! after the last event.
//!
//! Deletions the watcher propagates itself produce notifications of their
//! own; those paths are parked in a suppression set and the first matching
//! notification consumes them instead of being propagated again.
//!
//! Nothing raised while flushing leaves the worker thread. Failures go to
//! the log and the status callback.

mod debounce;

pub use debounce::DebounceQueue;

use crate::group::MirrorGroup;
use crate::marker::is_marker_name;
use crate::registry::Registry;
use crate::sync::SyncEngine;
use crate::Result;
use mirror_fs::{NormalizedPath, is_folder_symlink};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Default quiet period before acting on a path.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// How long `stop` waits for each worker before detaching it.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// `(source_path, affected_paths)`
pub type ChangeCallback = Arc<dyn Fn(&Path, &[PathBuf]) + Send + Sync>;
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A filesystem notification reduced to what the watcher acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Removed,
    Modified,
}

impl RawEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Created,
            path: path.into(),
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Removed,
            path: path.into(),
        }
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Modified,
            path: path.into(),
        }
    }
}

/// Reduce a notify event to raw events. Renames become a removal of the
/// old path and a creation of the new one.
pub fn map_notify_event(event: Event) -> Vec<RawEvent> {
    let Event { kind, paths, .. } = event;
    match kind {
        EventKind::Create(_) => paths.into_iter().map(RawEvent::created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(RawEvent::removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both => {
                let mut out = Vec::with_capacity(2);
                if let Some(from) = paths.first() {
                    out.push(RawEvent::removed(from.clone()));
                }
                if let Some(to) = paths.get(1) {
                    out.push(RawEvent::created(to.clone()));
                }
                out
            }
            RenameMode::From => paths.into_iter().map(RawEvent::removed).collect(),
            RenameMode::To => paths.into_iter().map(RawEvent::created).collect(),
            _ => paths
                .into_iter()
                .map(|path| {
                    if fs::symlink_metadata(&path).is_ok() {
                        RawEvent::created(path)
                    } else {
                        RawEvent::removed(path)
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => paths.into_iter().map(RawEvent::modified).collect(),
        _ => Vec::new(),
    }
}

#[derive(Clone, Default)]
struct Callbacks {
    on_sync: Option<ChangeCallback>,
    on_delete: Option<ChangeCallback>,
    on_status: Option<StatusCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Creates,
    Deletes,
}

impl TableKind {
    fn thread_name(self) -> &'static str {
        match self {
            TableKind::Creates => "mirror-watch-creates",
            TableKind::Deletes => "mirror-watch-deletes",
        }
    }
}

#[derive(Default)]
struct TableState {
    queue: DebounceQueue,
    stopped: bool,
}

/// One deadline table and the condition its worker sleeps on
#[derive(Default)]
struct Table {
    state: Mutex<TableState>,
    wake: Condvar,
}

impl Table {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn schedule(&self, path: PathBuf, due: Instant) {
        self.lock().queue.schedule(path, due);
        self.wake.notify_one();
    }

    fn extend(&self, path: &Path, due: Instant) -> bool {
        let extended = self.lock().queue.extend(path, due);
        if extended {
            self.wake.notify_one();
        }
        extended
    }

    fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Stop the worker, discarding anything still pending.
    fn stop(&self) {
        let mut state = self.lock();
        state.stopped = true;
        state.queue.clear();
        drop(state);
        self.wake.notify_all();
    }

    /// Worker loop: flush due paths, then sleep until the next deadline
    /// or until woken by a new schedule.
    fn run(&self, mut flush: impl FnMut(PathBuf)) {
        let mut state = self.lock();
        loop {
            if state.stopped {
                return;
            }
            let now = Instant::now();
            let ready = state.queue.pop_due(now);
            if !ready.is_empty() {
                drop(state);
                for path in ready {
                    flush(path);
                }
                state = self.lock();
                continue;
            }
            let next = state.queue.next_due();
            state = match next {
                Some(due) => {
                    self.wake
                        .wait_timeout(state, due.saturating_duration_since(now))
                        .unwrap_or_else(|e| e.into_inner())
                        .0
                }
                None => self.wake.wait(state).unwrap_or_else(|e| e.into_inner()),
            };
        }
    }
}

/// State shared between the event source, the workers and the handle
struct Shared {
    registry: Arc<Registry>,
    engine: SyncEngine,
    debounce: Duration,
    creates: Table,
    deletes: Table,
    suppressed: Mutex<HashSet<PathBuf>>,
    callbacks: Callbacks,
}

impl Shared {
    fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::Creates => &self.creates,
            TableKind::Deletes => &self.deletes,
        }
    }

    fn suppressed(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.suppressed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn status(&self, message: &str) {
        if let Some(on_status) = &self.callbacks.on_status {
            on_status(message);
        }
    }

    /// The auto-sync group containing `path`, if any.
    /// The first auto-sync group with a member folder containing `path`.
    /// Groups without auto-sync are skipped, even when one of their folders
    /// encloses an auto-sync group's folder.
    fn auto_sync_group(&self, path: &Path) -> Option<MirrorGroup> {
        let path = NormalizedPath::new(path);
        self.registry
            .list_groups()
            .into_iter()
            .find(|group| group.auto_sync && group.root_for(&path).is_some())
    }

    fn dispatch(&self, event: RawEvent) {
        let path = NormalizedPath::new(&event.path).to_native();
        if path.file_name().is_some_and(is_marker_name) || self.auto_sync_group(&path).is_none() {
            return;
        }
        let due = Instant::now() + self.debounce;
        match event.kind {
            RawEventKind::Created => {
                self.suppressed().remove(&path);
                self.creates.schedule(path, due);
            }
            RawEventKind::Modified => {
                self.creates.extend(&path, due);
            }
            RawEventKind::Removed => {
                if self.suppressed().remove(&path) {
                    debug!(path = %path.display(), "ignoring self-inflicted removal");
                    return;
                }
                self.deletes.schedule(path, due);
            }
        }
    }

    fn flush(&self, kind: TableKind, path: PathBuf) {
        match kind {
            TableKind::Creates => self.flush_create(&path),
            TableKind::Deletes => self.flush_delete(&path),
        }
    }

    fn flush_create(&self, path: &Path) {
        if fs::symlink_metadata(path).is_err() {
            debug!(path = %path.display(), "created path vanished before sync");
            return;
        }
        let Some(group) = self.auto_sync_group(path) else {
            return;
        };

        if path.is_dir() && !is_folder_symlink(path) {
            // A new directory arrives as one event; its contents may not.
            let entries = WalkDir::new(path)
                .min_depth(1)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() || is_folder_symlink(e.path()));
            for entry in entries {
                if !is_marker_name(entry.file_name()) {
                    self.sync_one(entry.path(), &group);
                }
            }
        } else {
            self.sync_one(path, &group);
        }
    }

    fn sync_one(&self, path: &Path, group: &MirrorGroup) {
        match self.engine.sync_file_to_group(path, group) {
            Ok(created) if created.is_empty() => {}
            Ok(created) => {
                self.status(&format!(
                    "Linked {} into {} folder(s) of '{}'",
                    path.display(),
                    created.len(),
                    group.name
                ));
                if let Some(on_sync) = &self.callbacks.on_sync {
                    on_sync(path, &created);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "auto-sync failed");
                self.status(&format!("Sync failed for {}: {e}", path.display()));
            }
        }
    }

    fn flush_delete(&self, path: &Path) {
        if fs::symlink_metadata(path).is_ok() {
            debug!(path = %path.display(), "removed path reappeared, not propagating");
            return;
        }
        if self.suppressed().remove(path) {
            return;
        }
        let Some(group) = self.auto_sync_group(path) else {
            return;
        };

        match self.engine.propagate_delete_to_group(path, &group) {
            Ok(removed) if removed.is_empty() => {}
            Ok(removed) => {
                self.suppressed().extend(removed.iter().cloned());
                self.status(&format!(
                    "Removed {} from {} folder(s) of '{}'",
                    path.display(),
                    removed.len(),
                    group.name
                ));
                if let Some(on_delete) = &self.callbacks.on_delete {
                    on_delete(path, &removed);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "delete propagation failed");
                self.status(&format!("Delete failed for {}: {e}", path.display()));
            }
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

fn spawn_worker(shared: &Arc<Shared>, kind: TableKind) -> Result<Worker> {
    let (done_tx, done) = mpsc::channel();
    let shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(kind.thread_name().to_string())
        .spawn(move || {
            shared.table(kind).run(|path| shared.flush(kind, path));
            let _ = done_tx.send(());
        })?;
    Ok(Worker { handle, done })
}

struct Running {
    shared: Arc<Shared>,
    watcher: RecommendedWatcher,
    workers: Vec<Worker>,
    watched: Vec<NormalizedPath>,
}

/// Watches every auto-sync group and keeps it in sync incrementally
pub struct MirrorWatcher {
    registry: Arc<Registry>,
    debounce: Duration,
    callbacks: Callbacks,
    running: Option<Running>,
}

impl MirrorWatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            debounce: DEFAULT_DEBOUNCE,
            callbacks: Callbacks::default(),
            running: None,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Called with the source path and the links created for it.
    pub fn on_sync(mut self, callback: impl Fn(&Path, &[PathBuf]) + Send + Sync + 'static) -> Self {
        self.callbacks.on_sync = Some(Arc::new(callback));
        self
    }

    /// Called with the removed path and the copies deleted elsewhere.
    pub fn on_delete(
        mut self,
        callback: impl Fn(&Path, &[PathBuf]) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.on_delete = Some(Arc::new(callback));
        self
    }

    /// Called with a human-readable line for every action and failure.
    pub fn on_status(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_status = Some(Arc::new(callback));
        self
    }

    /// Start watching all folders of auto-sync groups. Restarts if already
    /// running.
    ///
    /// # Errors
    ///
    /// Fails if the event source or a worker thread cannot be created.
    /// Folders that cannot be watched are logged and skipped.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let shared = Arc::new(Shared {
            registry: Arc::clone(&self.registry),
            engine: SyncEngine::for_registry(&self.registry),
            debounce: self.debounce,
            creates: Table::default(),
            deletes: Table::default(),
            suppressed: Mutex::new(HashSet::new()),
            callbacks: self.callbacks.clone(),
        });

        let events = Arc::clone(&shared);
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for raw in map_notify_event(event) {
                        events.dispatch(raw);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "watch error");
                    events.status(&format!("Watch error: {e}"));
                }
            }
        })?;

        // Events queued before the workers exist are flushed once they start
        let workers = match spawn_worker(&shared, TableKind::Creates)
            .and_then(|creates| Ok(vec![creates, spawn_worker(&shared, TableKind::Deletes)?]))
        {
            Ok(workers) => workers,
            Err(e) => {
                shared.creates.stop();
                shared.deletes.stop();
                return Err(e);
            }
        };

        let mut watched: Vec<NormalizedPath> = Vec::new();
        for group in self.registry.list_groups().iter().filter(|g| g.auto_sync) {
            for folder in &group.folders {
                if !folder.is_dir() || watched.contains(folder) {
                    continue;
                }
                match watcher.watch(folder.as_path(), RecursiveMode::Recursive) {
                    Ok(()) => watched.push(folder.clone()),
                    Err(e) => warn!(folder = %folder, error = %e, "cannot watch folder"),
                }
            }
        }
        info!(folders = watched.len(), debounce_ms = self.debounce.as_millis() as u64, "watcher started");

        self.running = Some(Running {
            shared,
            watcher,
            workers,
            watched,
        });
        Ok(())
    }

    /// Stop watching. Pending actions are discarded, not flushed.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        drop(running.watcher);
        running.shared.creates.stop();
        running.shared.deletes.stop();
        for worker in running.workers {
            match worker.done.recv_timeout(STOP_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = worker.handle.join();
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("watcher worker did not stop in time, detaching");
                }
            }
        }
        info!("watcher stopped");
    }

    /// Restart to pick up registry changes.
    pub fn refresh(&mut self) -> Result<()> {
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.workers.iter().all(|w| !w.handle.is_finished()))
    }

    /// Folders currently being watched.
    pub fn watched_folders(&self) -> &[NormalizedPath] {
        self.running
            .as_ref()
            .map(|r| r.watched.as_slice())
            .unwrap_or_default()
    }

    /// Feed one event through the same path notifications take. No-op
    /// when stopped.
    pub fn dispatch(&self, event: RawEvent) {
        if let Some(running) = &self.running {
            running.shared.dispatch(event);
        }
    }

    /// Number of `(creates, deletes)` waiting for their deadline.
    pub fn pending(&self) -> (usize, usize) {
        self.running.as_ref().map_or((0, 0), |r| {
            (r.shared.creates.len(), r.shared.deletes.len())
        })
    }
}

impl Drop for MirrorWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
