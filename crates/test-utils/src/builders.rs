#![allow(dead_code)]

use std::path::Path;

use repowatch::config::{ConfigFile, RawConfigFile, WatchSection};
use repowatch::repo::RepositoryPaths;
use repowatch::watch::{RawEvent, RawEventKind};

pub const REPO_ROOT: &str = "/repo";
pub const METADATA_DIR: &str = "/repo/.git";

pub const WORKTREE_ROOT: &str = "/work/feature";
pub const WORKTREE_METADATA_DIR: &str = "/repo/.git/worktrees/feature";

/// `/repo` with its metadata in `/repo/.git`.
pub fn sample_paths() -> RepositoryPaths {
    RepositoryPaths::new(REPO_ROOT, METADATA_DIR).unwrap()
}

/// Linked worktree at `/work/feature`, sharing `/repo/.git`.
pub fn worktree_paths() -> RepositoryPaths {
    RepositoryPaths::linked_worktree(WORKTREE_ROOT, METADATA_DIR, WORKTREE_METADATA_DIR).unwrap()
}

/// Linked worktree whose private metadata lives outside the common directory.
pub fn detached_worktree_paths() -> RepositoryPaths {
    RepositoryPaths::linked_worktree(WORKTREE_ROOT, METADATA_DIR, "/meta/feature").unwrap()
}

/// A `Modified` notification for an absolute path.
pub fn modified(path: impl AsRef<Path>) -> RawEvent {
    event(path, RawEventKind::Modified)
}

pub fn created(path: impl AsRef<Path>) -> RawEvent {
    event(path, RawEventKind::Created)
}

pub fn deleted(path: impl AsRef<Path>) -> RawEvent {
    event(path, RawEventKind::Deleted)
}

pub fn event(path: impl AsRef<Path>, kind: RawEventKind) -> RawEvent {
    RawEvent::from_path(path.as_ref(), kind).expect("event path needs a parent and a file name")
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    watch: WatchSection,
}

impl ConfigFileBuilder {
    /// Starts from the built-in defaults.
    pub fn new() -> Self {
        Self {
            watch: WatchSection::default(),
        }
    }

    /// Starts with no ignore rules at all.
    pub fn bare() -> Self {
        Self {
            watch: WatchSection {
                ignored_subtrees: Vec::new(),
                ignored_name_prefixes: Vec::new(),
                ..WatchSection::default()
            },
        }
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.watch.poll_interval_ms = ms;
        self
    }

    pub fn with_ignored_subtree(mut self, dir: &str) -> Self {
        self.watch.ignored_subtrees.push(dir.to_string());
        self
    }

    pub fn with_ignored_prefix(mut self, prefix: &str) -> Self {
        self.watch.ignored_name_prefixes.push(prefix.to_string());
        self
    }

    pub fn with_ignored_glob(mut self, pattern: &str) -> Self {
        self.watch.ignored_globs.push(pattern.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        RawConfigFile { watch: self.watch }
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.build_raw()).expect("builder produced an invalid config")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
