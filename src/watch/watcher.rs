// src/watch/watcher.rs

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::errors::{RepoWatchError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::repo::RepositoryPaths;
use crate::types::{SemanticEventKind, WatcherState};
use crate::watch::batch::{EventBatch, EventBatchResult};
use crate::watch::classifier::PathClassifier;
use crate::watch::gate::PassGate;
use crate::watch::listeners::{ListenerId, ListenerRegistry};
use crate::watch::source::{NotificationSource, NotifySourceFactory, SourceFactory};

/// Watches a repository and turns raw notifications into semantic events.
///
/// Lifecycle: `initialize()` opens the notification sources, `start()`
/// spawns the background loop, `stop()` wakes it so it exits promptly, and
/// `dispose()` (also run on drop) clears listeners, stops, and releases the
/// sources. `check_and_process_events()` may be called at any time; at most
/// one processing pass runs at once.
pub struct RepositoryWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    paths: Arc<RepositoryPaths>,
    classifier: PathClassifier,
    factory: Arc<dyn SourceFactory>,
    sources: Mutex<Sources>,
    listeners: ListenerRegistry,
    gate: PassGate,
    run_state: watch::Sender<RunState>,
    cancel: CancellationToken,
    poll_interval: Duration,
    disposed: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct Sources {
    primary: Option<Box<dyn NotificationSource>>,
    worktree: Option<Box<dyn NotificationSource>>,
}

impl Sources {
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn NotificationSource>> {
        self.primary.iter_mut().chain(self.worktree.iter_mut())
    }

    fn release(&mut self) {
        for mut source in self.primary.take().into_iter().chain(self.worktree.take()) {
            source.dispose();
        }
    }
}

/// Each `start()` bumps the epoch; a loop keeps going only while the state
/// is `Running` with the epoch it was spawned for.
#[derive(Debug, Clone, Copy, Default)]
struct RunState {
    state: WatcherState,
    epoch: u64,
}

impl RunState {
    fn is_current(&self, epoch: u64) -> bool {
        self.state == WatcherState::Running && self.epoch == epoch
    }
}

impl fmt::Debug for RepositoryWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryWatcher")
            .field("root", &self.inner.paths.root())
            .field("state", &self.state())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl RepositoryWatcher {
    pub fn builder(paths: RepositoryPaths) -> RepositoryWatcherBuilder {
        RepositoryWatcherBuilder::new(paths)
    }

    pub fn paths(&self) -> &RepositoryPaths {
        &self.inner.paths
    }

    pub fn state(&self) -> WatcherState {
        self.inner.run_state.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == WatcherState::Running
    }

    /// True once the primary (and, for worktrees, secondary) source is open.
    pub fn is_initialized(&self) -> bool {
        let sources = self.inner.lock_sources();
        sources.primary.is_some() && (!self.inner.paths.is_worktree() || sources.worktree.is_some())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    /// Open the notification sources.
    ///
    /// On failure everything opened so far is released, the error is logged
    /// and returned, and the watcher stays inert until a later call succeeds.
    pub fn initialize(&self) -> Result<()> {
        let inner = &self.inner;
        if self.is_disposed() {
            return Err(RepoWatchError::InvalidOperation(
                "cannot initialize a disposed watcher".to_string(),
            ));
        }

        let primary_root = inner.paths.primary_watch_root();
        let mut primary = inner.open_source(primary_root)?;

        let worktree = match inner.paths.secondary_watch_root() {
            Some(root) => match inner.open_source(root) {
                Ok(source) => Some(source),
                Err(err) => {
                    primary.dispose();
                    return Err(err);
                }
            },
            None => None,
        };

        let mut sources = inner.lock_sources();
        sources.release();
        sources.primary = Some(primary);
        sources.worktree = worktree;

        info!(root = ?primary_root, worktree = sources.worktree.is_some(), "repository watcher initialized");
        Ok(())
    }

    /// Spawn the background loop on the current Tokio runtime.
    ///
    /// Fails immediately if `initialize()` has not produced the required
    /// sources. Starting a running watcher is a no-op.
    pub fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if self.is_disposed() {
            return Err(RepoWatchError::InvalidOperation(
                "cannot start a disposed watcher".to_string(),
            ));
        }

        {
            let sources = inner.lock_sources();
            if sources.primary.is_none() {
                warn!("start() called without a primary notification source");
                return Err(RepoWatchError::InvalidOperation(
                    "no primary notification source; call initialize() first".to_string(),
                ));
            }
            if inner.paths.is_worktree() && sources.worktree.is_none() {
                warn!("start() called without a worktree notification source");
                return Err(RepoWatchError::InvalidOperation(
                    "no worktree notification source; call initialize() first".to_string(),
                ));
            }
        }

        if self.is_running() {
            warn!("start() called on a running watcher; ignoring");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            RepoWatchError::InvalidOperation("start() requires a Tokio runtime".to_string())
        })?;

        let mut epoch = 0;
        inner.run_state.send_modify(|run| {
            run.epoch += 1;
            run.state = WatcherState::Running;
            epoch = run.epoch;
        });

        info!(path = ?inner.paths.primary_watch_root(), "watching repository");
        if let Some(extra) = inner.paths.secondary_watch_root() {
            info!(path = ?extra, "watching additional path for worktree");
        }

        let handle = runtime.spawn(watch_loop(Arc::clone(inner), epoch));
        *inner.lock_loop_handle() = Some(handle);
        Ok(())
    }

    /// Ask the background loop to exit. No-op when already stopped.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Wait for the most recently started loop to finish.
    pub async fn wait_for_loop_exit(&self) {
        let handle = self.inner.lock_loop_handle().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("watch loop ended abnormally: {err}");
            }
        }
    }

    /// Run one processing pass (or join the one in flight) and return the
    /// number of kinds that reached at least one listener.
    pub async fn check_and_process_events(&self) -> usize {
        self.check_and_process_batch().await.fired
    }

    /// Same as [`check_and_process_events`](Self::check_and_process_events),
    /// returning the fired kinds as well.
    pub async fn check_and_process_batch(&self) -> EventBatchResult {
        self.inner.check_and_process().await
    }

    pub fn last_result(&self) -> EventBatchResult {
        self.inner.gate.last_result()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.gate.is_in_flight()
    }

    pub fn subscribe<F>(&self, kind: SemanticEventKind, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self, kind: SemanticEventKind) -> usize {
        self.inner.listeners.listener_count(kind)
    }

    /// Tear down: clear listeners first so nothing fires into disposed
    /// subscribers, stop the loop, then release the sources. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        inner.listeners.clear();
        inner.stop();
        inner.lock_sources().release();
        info!(root = ?inner.paths.root(), "repository watcher disposed");
    }
}

impl Drop for RepositoryWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl WatcherInner {
    fn open_source(&self, root: &Path) -> Result<Box<dyn NotificationSource>> {
        self.factory.open(root).map_err(|err| {
            error!(path = ?root, "failed to open notification source: {err}");
            match err {
                RepoWatchError::Initialization { .. } => err,
                other => RepoWatchError::Initialization {
                    path: root.to_path_buf(),
                    reason: other.to_string(),
                },
            }
        })
    }

    fn stop(&self) {
        let stopped = self.run_state.send_if_modified(|run| {
            if run.state == WatcherState::Running {
                run.state = WatcherState::Stopped;
                true
            } else {
                false
            }
        });
        if stopped {
            info!("repository watcher stopped");
        }
    }

    async fn check_and_process(&self) -> EventBatchResult {
        self.gate.run(&self.cancel, || self.run_pass()).await
    }

    /// One pass: drain every source into a single batch, then fire.
    fn run_pass(&self) -> EventBatchResult {
        let mut batch = EventBatch::new();
        {
            let mut sources = self.lock_sources();
            for source in sources.iter_mut() {
                let events = source.get_events();
                if !events.is_empty() {
                    batch.absorb(&self.classifier, events, &self.cancel);
                }
                if batch.interrupted() {
                    break;
                }
            }
        }

        if batch.interrupted() {
            debug!("cancellation observed during classification");
            self.stop();
        }

        let result = self.fire(&batch);
        if batch.raw_seen() > 0 {
            debug!(
                raw = batch.raw_seen(),
                ignored = batch.ignored(),
                faults = batch.faults(),
                kinds = ?result.kinds,
                fired = result.fired,
                "processed event batch"
            );
        }
        result
    }

    fn fire(&self, batch: &EventBatch) -> EventBatchResult {
        let plan = batch.firing_plan();
        let fired = plan
            .iter()
            .filter(|kind| self.listeners.fire(**kind) > 0)
            .count();

        EventBatchResult {
            kinds: plan.into_iter().collect(),
            fired,
        }
    }

    fn lock_sources(&self) -> MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_loop_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.loop_handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background loop: pass, then wait up to the poll interval for a stop,
/// restart or cancellation.
async fn watch_loop(inner: Arc<WatcherInner>, epoch: u64) {
    let mut state_rx = inner.run_state.subscribe();
    debug!(epoch, "watch loop started");

    loop {
        if inner.cancel.is_cancelled() {
            inner.stop();
            break;
        }
        let current = state_rx.borrow_and_update().is_current(epoch);
        if !current {
            break;
        }

        inner.check_and_process().await;

        tokio::select! {
            changed = state_rx.changed() => {
                let current = changed.is_ok() && state_rx.borrow().is_current(epoch);
                if !current {
                    break;
                }
            }
            _ = inner.cancel.cancelled() => {
                inner.stop();
                break;
            }
            _ = tokio::time::sleep(inner.poll_interval) => {}
        }
    }

    debug!(epoch, "watch loop exited");
}

/// Builder for [`RepositoryWatcher`].
pub struct RepositoryWatcherBuilder {
    paths: RepositoryPaths,
    config: ConfigFile,
    poll_interval: Option<Duration>,
    factory: Option<Arc<dyn SourceFactory>>,
    fs: Option<Arc<dyn FileSystem>>,
    cancel: Option<CancellationToken>,
}

impl RepositoryWatcherBuilder {
    pub fn new(paths: RepositoryPaths) -> Self {
        Self {
            paths,
            config: ConfigFile::default(),
            poll_interval: None,
            factory: None,
            fs: None,
            cancel: None,
        }
    }

    /// Ignore rules and poll interval come from `config`.
    pub fn config(mut self, config: &ConfigFile) -> Self {
        self.config = config.clone();
        self
    }

    /// Override the configured poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn source_factory(mut self, factory: Arc<dyn SourceFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<RepositoryWatcher> {
        let poll_interval = self
            .poll_interval
            .unwrap_or_else(|| self.config.poll_interval());
        if poll_interval.is_zero() {
            return Err(RepoWatchError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let ignore = self.config.ignore_rules(self.paths.root())?;
        let paths = Arc::new(self.paths);
        let fs = self.fs.unwrap_or_else(|| Arc::new(RealFileSystem));
        let classifier = PathClassifier::new(Arc::clone(&paths), ignore, fs);
        let (run_state, _) = watch::channel(RunState::default());

        let inner = WatcherInner {
            paths,
            classifier,
            factory: self
                .factory
                .unwrap_or_else(|| Arc::new(NotifySourceFactory)),
            sources: Mutex::new(Sources::default()),
            listeners: ListenerRegistry::new(),
            gate: PassGate::new(),
            run_state,
            cancel: self.cancel.unwrap_or_default(),
            poll_interval,
            disposed: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
        };

        Ok(RepositoryWatcher {
            inner: Arc::new(inner),
        })
    }
}
