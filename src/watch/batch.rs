// src/watch/batch.rs

//! Coalescing of one processing pass.
//!
//! All raw events pulled during a pass (from every source) are folded into a
//! single set of semantic kinds. The set is turned into a firing plan: fixed
//! order, with `IndexChanged` dropped whenever `RepositoryChanged` is present.

use std::collections::{BTreeSet, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::types::SemanticEventKind;
use crate::watch::classifier::PathClassifier;
use crate::watch::source::RawEvent;

/// Outcome of one pass: the distinct kinds collected and how many of them
/// reached at least one listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatchResult {
    pub kinds: BTreeSet<SemanticEventKind>,
    pub fired: usize,
}

/// Accumulates classified kinds for a single pass.
#[derive(Debug, Default)]
pub struct EventBatch {
    kinds: HashSet<SemanticEventKind>,
    raw_seen: usize,
    ignored: usize,
    faults: usize,
    interrupted: bool,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `events` into this batch.
    ///
    /// Stops early (and marks the batch interrupted) once `cancel` fires.
    /// Unresolvable events are logged and counted as ignored.
    pub fn absorb<I>(&mut self, classifier: &PathClassifier, events: I, cancel: &CancellationToken)
    where
        I: IntoIterator<Item = RawEvent>,
    {
        for event in events {
            if cancel.is_cancelled() {
                self.interrupted = true;
                break;
            }
            self.raw_seen += 1;

            match classifier.classify(&event, &self.kinds) {
                Ok(Some(kind)) => {
                    self.kinds.insert(kind);
                }
                Ok(None) => self.ignored += 1,
                Err(err) => {
                    warn!(event = %event, "skipping raw event: {err}");
                    self.faults += 1;
                    self.ignored += 1;
                }
            }
        }
    }

    pub fn contains(&self, kind: SemanticEventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> BTreeSet<SemanticEventKind> {
        self.kinds.iter().copied().collect()
    }

    pub fn raw_seen(&self) -> usize {
        self.raw_seen
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }

    pub fn faults(&self) -> usize {
        self.faults
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Kinds to fire, in firing order.
    ///
    /// A working-tree change already implies index churn, so `IndexChanged`
    /// is suppressed when `RepositoryChanged` is present.
    pub fn firing_plan(&self) -> Vec<SemanticEventKind> {
        let suppress_index = self.contains(SemanticEventKind::RepositoryChanged);
        SemanticEventKind::FIRING_ORDER
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .filter(|kind| !(suppress_index && *kind == SemanticEventKind::IndexChanged))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::fs::mock::MockFileSystem;
    use crate::repo::RepositoryPaths;
    use crate::watch::classifier::IgnoreRules;
    use crate::watch::source::RawEventKind;
    use SemanticEventKind::*;

    fn classifier() -> PathClassifier {
        let paths = RepositoryPaths::new("/repo", "/repo/.git").unwrap();
        PathClassifier::new(
            Arc::new(paths),
            IgnoreRules::new(),
            Arc::new(MockFileSystem::new()),
        )
    }

    fn touch(dir: &str, name: &str) -> RawEvent {
        RawEvent::new(dir, name, RawEventKind::Modified)
    }

    #[test]
    fn head_and_repeated_index_touches_coalesce() {
        let mut batch = EventBatch::new();
        batch.absorb(
            &classifier(),
            vec![
                touch("/repo/.git", "HEAD"),
                touch("/repo/.git", "index"),
                touch("/repo/.git", "index"),
            ],
            &CancellationToken::new(),
        );

        assert_eq!(batch.kinds(), [HeadChanged, IndexChanged].into_iter().collect());
        assert_eq!(batch.firing_plan(), vec![HeadChanged, IndexChanged]);
        assert_eq!(batch.raw_seen(), 3);
        assert_eq!(batch.ignored(), 1);
    }

    #[test]
    fn working_tree_change_suppresses_index() {
        let mut batch = EventBatch::new();
        batch.absorb(
            &classifier(),
            vec![touch("/repo/src", "main.txt"), touch("/repo/.git", "index")],
            &CancellationToken::new(),
        );

        assert!(batch.contains(IndexChanged));
        assert_eq!(batch.firing_plan(), vec![RepositoryChanged]);
    }

    #[test]
    fn firing_plan_follows_fixed_order() {
        let mut batch = EventBatch::new();
        batch.absorb(
            &classifier(),
            vec![
                touch("/repo/.git", "COMMIT_EDITMSG"),
                touch("/repo/.git/refs/remotes/origin", "main"),
                touch("/repo/.git/refs/heads", "main"),
                touch("/repo/.git", "HEAD"),
                touch("/repo/.git", "config"),
            ],
            &CancellationToken::new(),
        );

        assert_eq!(
            batch.firing_plan(),
            vec![
                ConfigChanged,
                HeadChanged,
                LocalBranchesChanged,
                RemoteBranchesChanged,
                RepositoryCommitted,
            ]
        );
    }

    #[test]
    fn faults_are_isolated() {
        let mut batch = EventBatch::new();
        batch.absorb(
            &classifier(),
            vec![touch("/repo/.git", ""), touch("/repo/.git", "HEAD")],
            &CancellationToken::new(),
        );

        assert_eq!(batch.faults(), 1);
        assert_eq!(batch.firing_plan(), vec![HeadChanged]);
    }

    #[test]
    fn cancellation_interrupts_absorb() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut batch = EventBatch::new();
        batch.absorb(&classifier(), vec![touch("/repo/.git", "HEAD")], &cancel);

        assert!(batch.interrupted());
        assert!(batch.is_empty());
        assert_eq!(batch.raw_seen(), 0);
    }
}
