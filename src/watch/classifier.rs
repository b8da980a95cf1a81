// src/watch/classifier.rs

//! Raw notification -> semantic event classification.
//!
//! Metadata paths are matched against the repository's well-known files in
//! a fixed order (config, HEAD, index, remotes, branches, commit message);
//! anything outside the metadata directories is a working-tree change unless
//! an ignore rule applies. Kinds already seen in the current batch are
//! skipped so a burst of identical notifications yields one event.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::repo::RepositoryPaths;
use crate::types::SemanticEventKind;
use crate::watch::path_utils::{is_child_of, is_within, relative_str};
use crate::watch::source::RawEvent;

/// Working-tree paths that never produce `RepositoryChanged`.
#[derive(Clone, Default)]
pub struct IgnoreRules {
    subtrees: Vec<PathBuf>,
    name_prefixes: Vec<String>,
    globs: Option<GlobSet>,
}

impl fmt::Debug for IgnoreRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreRules")
            .field("subtrees", &self.subtrees)
            .field("name_prefixes", &self.name_prefixes)
            .field("globs", &self.globs.as_ref().map(GlobSet::len))
            .finish()
    }
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore everything below `dir` (absolute).
    pub fn subtree(mut self, dir: impl Into<PathBuf>) -> Self {
        self.subtrees.push(dir.into());
        self
    }

    /// Ignore files whose name starts with `prefix` (sync or editor markers).
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefixes.push(prefix.into());
        self
    }

    /// Ignore root-relative paths matching any of `patterns`.
    pub fn globs<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            self.globs = None;
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid ignore glob pattern: {pattern}"))?;
            builder.add(glob);
        }
        self.globs = Some(builder.build().context("building ignore glob set")?);
        Ok(self)
    }

    pub fn subtrees(&self) -> &[PathBuf] {
        &self.subtrees
    }

    pub fn name_prefixes(&self) -> &[String] {
        &self.name_prefixes
    }

    fn excludes(&self, root: &Path, path: &Path, file_name: &str) -> bool {
        if self
            .name_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
        {
            return true;
        }
        if self.subtrees.iter().any(|dir| is_child_of(path, dir)) {
            return true;
        }
        match (&self.globs, relative_str(root, path)) {
            (Some(globs), Some(rel)) => globs.is_match(rel.as_str()),
            _ => false,
        }
    }
}

/// Maps raw events to at most one [`SemanticEventKind`] each.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    paths: Arc<RepositoryPaths>,
    ignore: IgnoreRules,
    fs: Arc<dyn FileSystem>,
}

impl PathClassifier {
    pub fn new(paths: Arc<RepositoryPaths>, ignore: IgnoreRules, fs: Arc<dyn FileSystem>) -> Self {
        Self { paths, ignore, fs }
    }

    pub fn paths(&self) -> &RepositoryPaths {
        &self.paths
    }

    /// Classify one raw event given the kinds already collected in this batch.
    ///
    /// `Ok(None)` means the event is ignored. An event whose path cannot be
    /// resolved is an error; callers skip it and carry on.
    pub fn classify(
        &self,
        event: &RawEvent,
        seen: &HashSet<SemanticEventKind>,
    ) -> Result<Option<SemanticEventKind>> {
        let path = event.affected_path()?;
        let kind = if self.paths.is_metadata_path(&path) {
            self.classify_metadata(&path, seen)
        } else {
            self.classify_working_tree(&path, seen)
        };

        trace!(path = ?path, kind = ?kind, "classified raw event");
        Ok(kind)
    }

    fn classify_metadata(
        &self,
        path: &Path,
        seen: &HashSet<SemanticEventKind>,
    ) -> Option<SemanticEventKind> {
        use SemanticEventKind::*;

        let paths = &*self.paths;
        let unseen = |kind: SemanticEventKind| !seen.contains(&kind);

        if unseen(ConfigChanged) && path == paths.config() {
            Some(ConfigChanged)
        } else if unseen(HeadChanged) && path == paths.head() {
            Some(HeadChanged)
        } else if unseen(IndexChanged) && path == paths.index() {
            Some(IndexChanged)
        } else if unseen(RemoteBranchesChanged) && is_child_of(path, paths.remotes_dir()) {
            Some(RemoteBranchesChanged)
        } else if unseen(LocalBranchesChanged) && is_child_of(path, paths.branches_dir()) {
            Some(LocalBranchesChanged)
        } else if unseen(RepositoryCommitted) && is_within(path, paths.commit_edit_msg()) {
            Some(RepositoryCommitted)
        } else {
            None
        }
    }

    fn classify_working_tree(
        &self,
        path: &Path,
        seen: &HashSet<SemanticEventKind>,
    ) -> Option<SemanticEventKind> {
        if seen.contains(&SemanticEventKind::RepositoryChanged) {
            return None;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.ignore.excludes(self.paths.root(), path, &file_name) || self.fs.is_dir(path) {
            return None;
        }

        Some(SemanticEventKind::RepositoryChanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::source::RawEventKind;
    use SemanticEventKind::*;

    fn classifier_with(fs: MockFileSystem, ignore: IgnoreRules) -> PathClassifier {
        let paths = RepositoryPaths::new("/repo", "/repo/.git").unwrap();
        PathClassifier::new(Arc::new(paths), ignore, Arc::new(fs))
    }

    fn classifier() -> PathClassifier {
        classifier_with(MockFileSystem::new(), IgnoreRules::new())
    }

    fn modified(dir: &str, name: &str) -> RawEvent {
        RawEvent::new(dir, name, RawEventKind::Modified)
    }

    fn classify(c: &PathClassifier, event: RawEvent) -> Option<SemanticEventKind> {
        c.classify(&event, &HashSet::new()).unwrap()
    }

    #[test]
    fn well_known_metadata_files() {
        let c = classifier();
        assert_eq!(classify(&c, modified("/repo/.git", "config")), Some(ConfigChanged));
        assert_eq!(classify(&c, modified("/repo/.git", "HEAD")), Some(HeadChanged));
        assert_eq!(classify(&c, modified("/repo/.git", "index")), Some(IndexChanged));
        assert_eq!(
            classify(&c, modified("/repo/.git/refs/remotes/origin", "main")),
            Some(RemoteBranchesChanged)
        );
        assert_eq!(
            classify(&c, modified("/repo/.git/refs/heads/feature", "x")),
            Some(LocalBranchesChanged)
        );
        assert_eq!(
            classify(&c, modified("/repo/.git", "COMMIT_EDITMSG")),
            Some(RepositoryCommitted)
        );
    }

    #[test]
    fn other_metadata_is_ignored() {
        let c = classifier();
        assert_eq!(classify(&c, modified("/repo/.git/objects/ab", "cdef")), None);
        assert_eq!(classify(&c, modified("/repo/.git", "index.lock")), None);
        // The refs directories themselves are not branch changes.
        assert_eq!(classify(&c, modified("/repo/.git/refs", "heads")), None);
    }

    #[test]
    fn already_seen_kinds_fall_through() {
        let c = classifier();
        let seen: HashSet<_> = [IndexChanged].into_iter().collect();
        assert_eq!(c.classify(&modified("/repo/.git", "index"), &seen).unwrap(), None);
        assert_eq!(
            c.classify(&modified("/repo/.git", "HEAD"), &seen).unwrap(),
            Some(HeadChanged)
        );
    }

    #[test]
    fn working_tree_changes_and_exclusions() {
        let fs = MockFileSystem::new();
        fs.add_dir("/repo/src/nested");
        let ignore = IgnoreRules::new()
            .subtree("/repo/Library")
            .name_prefix("~UnityDirMonSync")
            .name_prefix(".vs")
            .globs(&["**/*.tmp"])
            .unwrap();
        let c = classifier_with(fs, ignore);

        assert_eq!(classify(&c, modified("/repo/src", "main.txt")), Some(RepositoryChanged));
        assert_eq!(classify(&c, modified("/repo/src", "nested")), None);
        assert_eq!(classify(&c, modified("/repo/Library/cache", "a.bin")), None);
        assert_eq!(classify(&c, modified("/repo", "~UnityDirMonSync1234")), None);
        assert_eq!(classify(&c, modified("/repo", ".vsconfig")), None);
        assert_eq!(classify(&c, modified("/repo/src", "scratch.tmp")), None);

        let seen: HashSet<_> = [RepositoryChanged].into_iter().collect();
        assert_eq!(c.classify(&modified("/repo/src", "lib.txt"), &seen).unwrap(), None);
    }

    #[test]
    fn worktree_metadata_counts_as_metadata() {
        let paths =
            RepositoryPaths::linked_worktree("/wt", "/repo/.git", "/repo/.git/worktrees/wt").unwrap();
        let c = PathClassifier::new(
            Arc::new(paths),
            IgnoreRules::new(),
            Arc::new(MockFileSystem::new()),
        );

        assert_eq!(
            classify(&c, modified("/repo/.git/worktrees/wt", "HEAD")),
            Some(HeadChanged)
        );
        assert_eq!(classify(&c, modified("/repo/.git", "config")), Some(ConfigChanged));
        // Another worktree's HEAD is metadata, but not ours.
        assert_eq!(classify(&c, modified("/repo/.git/worktrees/other", "HEAD")), None);
        assert_eq!(classify(&c, modified("/wt/src", "a.rs")), Some(RepositoryChanged));
    }

    #[test]
    fn unresolvable_events_are_errors() {
        let c = classifier();
        assert!(c.classify(&modified("/repo", ""), &HashSet::new()).is_err());
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(IgnoreRules::new().globs(&["a/{b"]).is_err());
    }
}
