// src/watch/source.rs

//! Raw notification sources.
//!
//! A source is bound to one directory and hands out whatever path-level
//! notifications piled up since the last call. The watcher never blocks on a
//! source; `get_events` returns an empty batch when nothing is pending.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::errors::{RepoWatchError, Result};

/// Kind of raw notification, as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Created,
    Modified,
    Deleted,
    Renamed,
    Unknown,
}

impl RawEventKind {
    /// Map a `notify` event kind; access notifications carry no change and
    /// map to `None`.
    fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Renamed),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Deleted),
            _ => Some(Self::Unknown),
        }
    }
}

/// One path-level notification: `directory` + `name`, with the rename source
/// name in `previous_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub directory: PathBuf,
    pub name: String,
    pub previous_name: Option<String>,
    pub kind: RawEventKind,
}

impl RawEvent {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>, kind: RawEventKind) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            previous_name: None,
            kind,
        }
    }

    pub fn renamed(
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
        previous_name: impl Into<String>,
    ) -> Self {
        Self {
            previous_name: Some(previous_name.into()),
            ..Self::new(directory, name, RawEventKind::Renamed)
        }
    }

    /// Split an absolute path into directory and file name.
    pub fn from_path(path: &Path, kind: RawEventKind) -> Option<Self> {
        let directory = path.parent()?;
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self::new(directory, name, kind))
    }

    /// The path this notification is about: `directory` joined with `name`.
    ///
    /// Fails for a relative directory, or a name that is empty or is not a
    /// single normal path component.
    pub fn affected_path(&self) -> Result<PathBuf> {
        let fault = |reason: &str| RepoWatchError::ProcessingFault {
            path: self.directory.join(&self.name),
            reason: reason.to_string(),
        };

        if !self.directory.is_absolute() {
            return Err(fault("event directory is not absolute"));
        }
        if self.name.is_empty() {
            return Err(fault("event has an empty file name"));
        }

        let mut components = Path::new(&self.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.directory.join(&self.name)),
            _ => Err(fault("event name is not a single path component")),
        }
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.directory.join(&self.name).display())?;
        if let Some(previous) = &self.previous_name {
            write!(f, " (from {previous})")?;
        }
        Ok(())
    }
}

/// A handle on pending filesystem notifications for one directory tree.
pub trait NotificationSource: Send + fmt::Debug {
    /// Drain pending notifications. Never blocks.
    fn get_events(&mut self) -> Vec<RawEvent>;

    /// Release OS resources. Calling it twice is harmless.
    fn dispose(&mut self);
}

/// Opens notification sources; injected so tests can script events.
pub trait SourceFactory: Send + Sync + fmt::Debug {
    fn open(&self, root: &Path) -> Result<Box<dyn NotificationSource>>;
}

/// `notify`-backed source watching a directory recursively.
pub struct NotifySource {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
    event_rx: Receiver<notify::Result<Event>>,
}

impl fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifySource")
            .field("root", &self.root)
            .field("active", &self.watcher.is_some())
            .finish()
    }
}

impl NotifySource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let (event_tx, event_rx) = mpsc::channel();

        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the source is disposed.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| RepoWatchError::Initialization {
            path: root.clone(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| RepoWatchError::Initialization {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        info!("notification source watching {:?}", root);

        Ok(Self {
            root,
            watcher: Some(watcher),
            event_rx,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl NotificationSource for NotifySource {
    fn get_events(&mut self) -> Vec<RawEvent> {
        let mut events = Vec::new();
        if self.watcher.is_none() {
            return events;
        }

        loop {
            match self.event_rx.try_recv() {
                Ok(Ok(event)) => events.extend(convert_notify_event(&event)),
                Ok(Err(err)) => warn!(root = ?self.root, "file watch error: {err}"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    fn dispose(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.unwatch(&self.root) {
                debug!(root = ?self.root, "unwatch failed during dispose: {err}");
            }
            info!("notification source released {:?}", self.root);
        }
    }
}

impl Drop for NotifySource {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Opens a [`NotifySource`] per requested root.
#[derive(Debug, Clone, Default)]
pub struct NotifySourceFactory;

impl SourceFactory for NotifySourceFactory {
    fn open(&self, root: &Path) -> Result<Box<dyn NotificationSource>> {
        Ok(Box::new(NotifySource::open(root)?))
    }
}

/// Flatten one `notify` event into raw events.
///
/// A rename reported with both endpoints becomes a single event for the new
/// path, remembering the old name.
fn convert_notify_event(event: &Event) -> Vec<RawEvent> {
    let Some(kind) = RawEventKind::from_notify(&event.kind) else {
        return Vec::new();
    };

    if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
        if let [from, to] = event.paths.as_slice() {
            if let Some(mut raw) = RawEvent::from_path(to, kind) {
                raw.previous_name = from
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                return vec![raw];
            }
        }
    }

    event
        .paths
        .iter()
        .filter_map(|path| RawEvent::from_path(path, kind))
        .collect()
}
