use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use repowatch::errors::{RepoWatchError, Result};
use repowatch::watch::{NotificationSource, RawEvent, SourceFactory};

/// A notification source driven by the test:
/// - `push` queues raw events for the next `get_events`
/// - records how often it was polled and whether it was disposed
/// - can hold one poll open until the test releases it.
///
/// The test keeps a handle; every `open` hands the watcher a live instance
/// sharing the same queue. The handle itself never yields events.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    state: Arc<Mutex<ScriptState>>,
    live: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    pending: Vec<RawEvent>,
    polls: usize,
    live: usize,
    disposals: usize,
    hold: Option<(Sender<()>, Receiver<()>)>,
}

/// Test side of a held poll.
pub struct PollHold {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl PollHold {
    /// Block until the watcher is inside `get_events`.
    pub fn wait_entered(&self) {
        self.entered.recv().expect("scripted source dropped before polling");
    }

    /// Let the held poll return.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RawEvent) {
        self.state.lock().unwrap().pending.push(event);
    }

    pub fn push_all(&self, events: impl IntoIterator<Item = RawEvent>) {
        self.state.lock().unwrap().pending.extend(events);
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    /// True once every opened instance has been disposed.
    pub fn is_disposed(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.disposals > 0 && state.live == 0
    }

    pub fn disposals(&self) -> usize {
        self.state.lock().unwrap().disposals
    }

    fn open_instance(&self) -> Self {
        self.state.lock().unwrap().live += 1;
        Self {
            state: Arc::clone(&self.state),
            live: true,
        }
    }

    /// The next `get_events` call blocks until the returned hold is released.
    pub fn hold_next_poll(&self) -> PollHold {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        self.state.lock().unwrap().hold = Some((entered_tx, release_rx));
        PollHold {
            entered: entered_rx,
            release: release_tx,
        }
    }
}

impl NotificationSource for ScriptedSource {
    fn get_events(&mut self) -> Vec<RawEvent> {
        if !self.live {
            return Vec::new();
        }
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            state.hold.take()
        };

        if let Some((entered, release)) = hold {
            let _ = entered.send(());
            let _ = release.recv();
        }

        if !self.live {
            return Vec::new();
        }
        std::mem::take(&mut self.state.lock().unwrap().pending)
    }

    fn dispose(&mut self) {
        if std::mem::take(&mut self.live) {
            let mut state = self.state.lock().unwrap();
            state.live -= 1;
            state.disposals += 1;
        }
    }
}

/// Hands out a [`ScriptedSource`] per watch root.
///
/// Tests fetch the same source with [`ScriptedSourceFactory::source`], before
/// or after the watcher opened it.
#[derive(Debug, Default)]
pub struct ScriptedSourceFactory {
    sources: Mutex<HashMap<PathBuf, ScriptedSource>>,
    failing: Mutex<HashSet<PathBuf>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl ScriptedSourceFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn source(&self, root: impl AsRef<Path>) -> ScriptedSource {
        self.sources
            .lock()
            .unwrap()
            .entry(root.as_ref().to_path_buf())
            .or_default()
            .clone()
    }

    /// Make `open` fail for `root` until [`ScriptedSourceFactory::recover`].
    pub fn fail_on(&self, root: impl AsRef<Path>) {
        self.failing.lock().unwrap().insert(root.as_ref().to_path_buf());
    }

    pub fn recover(&self, root: impl AsRef<Path>) {
        self.failing.lock().unwrap().remove(root.as_ref());
    }

    /// Roots opened so far, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl SourceFactory for ScriptedSourceFactory {
    fn open(&self, root: &Path) -> Result<Box<dyn NotificationSource>> {
        if self.failing.lock().unwrap().contains(root) {
            return Err(RepoWatchError::Initialization {
                path: root.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        self.opened.lock().unwrap().push(root.to_path_buf());
        Ok(Box::new(self.source(root).open_instance()))
    }
}
