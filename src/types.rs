// src/types.rs

use std::fmt;
use std::str::FromStr;

/// Domain-level change classified from raw filesystem notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticEventKind {
    ConfigChanged,
    HeadChanged,
    IndexChanged,
    LocalBranchesChanged,
    RemoteBranchesChanged,
    RepositoryCommitted,
    /// Catch-all for working-tree changes outside the metadata directory.
    RepositoryChanged,
}

impl SemanticEventKind {
    pub const ALL: [SemanticEventKind; 7] = [
        SemanticEventKind::ConfigChanged,
        SemanticEventKind::HeadChanged,
        SemanticEventKind::IndexChanged,
        SemanticEventKind::LocalBranchesChanged,
        SemanticEventKind::RemoteBranchesChanged,
        SemanticEventKind::RepositoryCommitted,
        SemanticEventKind::RepositoryChanged,
    ];

    /// Order in which listeners are fired at the end of a pass.
    pub const FIRING_ORDER: [SemanticEventKind; 7] = [
        SemanticEventKind::ConfigChanged,
        SemanticEventKind::HeadChanged,
        SemanticEventKind::LocalBranchesChanged,
        SemanticEventKind::RemoteBranchesChanged,
        SemanticEventKind::IndexChanged,
        SemanticEventKind::RepositoryChanged,
        SemanticEventKind::RepositoryCommitted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticEventKind::ConfigChanged => "config_changed",
            SemanticEventKind::HeadChanged => "head_changed",
            SemanticEventKind::IndexChanged => "index_changed",
            SemanticEventKind::LocalBranchesChanged => "local_branches_changed",
            SemanticEventKind::RemoteBranchesChanged => "remote_branches_changed",
            SemanticEventKind::RepositoryCommitted => "repository_committed",
            SemanticEventKind::RepositoryChanged => "repository_changed",
        }
    }
}

impl fmt::Display for SemanticEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        SemanticEventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown event kind: {s}"))
    }
}

/// Lifecycle state of a `RepositoryWatcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherState {
    #[default]
    Stopped,
    Running,
}
