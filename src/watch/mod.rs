// src/watch/mod.rs

//! Repository change watching.
//!
//! This module is responsible for:
//! - Pulling raw path-level notifications from one or two sources
//!   (`source`; the second one only for linked worktrees).
//! - Classifying each notification into a semantic event (`classifier`).
//! - Coalescing a pass into a minimal set of events and a firing plan
//!   (`batch`).
//! - Dispatching to per-kind listeners (`listeners`), with at most one pass
//!   in flight (`gate`).
//! - The start/stop lifecycle and background loop (`watcher`).

pub mod batch;
pub mod classifier;
pub mod gate;
pub mod listeners;
pub mod path_utils;
pub mod source;
pub mod watcher;

pub use batch::{EventBatch, EventBatchResult};
pub use classifier::{IgnoreRules, PathClassifier};
pub use listeners::{Listener, ListenerId, ListenerRegistry};
pub use source::{
    NotificationSource, NotifySource, NotifySourceFactory, RawEvent, RawEventKind, SourceFactory,
};
pub use watcher::{RepositoryWatcher, RepositoryWatcherBuilder};
