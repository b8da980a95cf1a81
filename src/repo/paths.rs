// src/repo/paths.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{RepoWatchError, Result};
use crate::fs::FileSystem;
use crate::watch::path_utils::{is_within, normalize};

const DOT_GIT: &str = ".git";
const GITDIR_PREFIX: &str = "gitdir:";

/// Well-known locations of a repository's working tree and metadata.
///
/// Built once and shared read-only by the watcher and the classifier.
/// All paths are absolute and lexically normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPaths {
    root: PathBuf,
    metadata_dir: PathBuf,
    head: PathBuf,
    config: PathBuf,
    index: PathBuf,
    branches_dir: PathBuf,
    remotes_dir: PathBuf,
    commit_edit_msg: PathBuf,
    worktree_metadata_dir: Option<PathBuf>,
}

impl RepositoryPaths {
    /// Standard layout: every well-known file lives under `metadata_dir`.
    pub fn new(root: impl AsRef<Path>, metadata_dir: impl AsRef<Path>) -> Result<Self> {
        let root = absolute("root", root.as_ref())?;
        let metadata_dir = absolute("metadata directory", metadata_dir.as_ref())?;

        Ok(Self {
            head: metadata_dir.join("HEAD"),
            config: metadata_dir.join("config"),
            index: metadata_dir.join("index"),
            branches_dir: metadata_dir.join("refs").join("heads"),
            remotes_dir: metadata_dir.join("refs").join("remotes"),
            commit_edit_msg: metadata_dir.join("COMMIT_EDITMSG"),
            root,
            metadata_dir,
            worktree_metadata_dir: None,
        })
    }

    /// Linked worktree layout.
    ///
    /// Config and refs are shared through `common_dir`; HEAD, index and the
    /// commit message scratch file belong to the worktree's own `worktree_dir`.
    pub fn linked_worktree(
        root: impl AsRef<Path>,
        common_dir: impl AsRef<Path>,
        worktree_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let mut paths = Self::new(root, common_dir)?;
        let worktree_dir = absolute("worktree metadata directory", worktree_dir.as_ref())?;

        if worktree_dir == paths.metadata_dir {
            return Err(RepoWatchError::InvalidPaths(format!(
                "worktree metadata directory {:?} is the main metadata directory",
                worktree_dir
            )));
        }

        paths.head = worktree_dir.join("HEAD");
        paths.index = worktree_dir.join("index");
        paths.commit_edit_msg = worktree_dir.join("COMMIT_EDITMSG");
        paths.worktree_metadata_dir = Some(worktree_dir);
        Ok(paths)
    }

    /// Inspect `<root>/.git` and build the matching layout.
    ///
    /// - a directory means a regular repository;
    /// - a file holding `gitdir: <dir>` means a linked worktree whose common
    ///   directory comes from `<dir>/commondir`, falling back to the
    ///   grandparent of `<dir>` (`<common>/worktrees/<name>`).
    pub fn discover(fs: &dyn FileSystem, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = fs
            .canonicalize(root)
            .map_err(|_| RepoWatchError::NotARepository(root.to_path_buf()))?;
        let dot_git = root.join(DOT_GIT);

        if fs.is_dir(&dot_git) {
            debug!(root = ?root, "discovered regular repository");
            return Self::new(&root, &dot_git);
        }

        if !fs.is_file(&dot_git) {
            return Err(RepoWatchError::NotARepository(root));
        }

        let contents = fs.read_to_string(&dot_git)?;
        let gitdir = parse_gitdir(&contents).ok_or_else(|| {
            RepoWatchError::InvalidPaths(format!("{:?} does not contain a gitdir line", dot_git))
        })?;
        let worktree_dir = normalize(&root.join(gitdir));

        let commondir_file = worktree_dir.join("commondir");
        let common_dir = if fs.is_file(&commondir_file) {
            let rel = fs.read_to_string(&commondir_file)?;
            normalize(&worktree_dir.join(rel.trim()))
        } else {
            worktree_dir
                .parent()
                .and_then(Path::parent)
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    RepoWatchError::InvalidPaths(format!(
                        "cannot derive common directory from {:?}",
                        worktree_dir
                    ))
                })?
        };

        debug!(
            root = ?root,
            common = ?common_dir,
            worktree = ?worktree_dir,
            "discovered linked worktree"
        );
        Self::linked_worktree(&root, &common_dir, &worktree_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn head(&self) -> &Path {
        &self.head
    }

    pub fn config(&self) -> &Path {
        &self.config
    }

    pub fn index(&self) -> &Path {
        &self.index
    }

    pub fn branches_dir(&self) -> &Path {
        &self.branches_dir
    }

    pub fn remotes_dir(&self) -> &Path {
        &self.remotes_dir
    }

    pub fn commit_edit_msg(&self) -> &Path {
        &self.commit_edit_msg
    }

    pub fn worktree_metadata_dir(&self) -> Option<&Path> {
        self.worktree_metadata_dir.as_deref()
    }

    pub fn is_worktree(&self) -> bool {
        self.worktree_metadata_dir.is_some()
    }

    /// True if `path` belongs to the main or the worktree metadata directory.
    pub fn is_metadata_path(&self, path: &Path) -> bool {
        is_within(path, &self.metadata_dir)
            || self
                .worktree_metadata_dir
                .as_deref()
                .is_some_and(|dir| is_within(path, dir))
    }

    /// Directory the primary notification source is bound to.
    pub fn primary_watch_root(&self) -> &Path {
        &self.root
    }

    /// Directory the secondary (worktree) notification source is bound to.
    ///
    /// When the worktree metadata lives inside the common directory, watching
    /// the common directory covers both config/refs and the worktree's own
    /// HEAD and index.
    pub fn secondary_watch_root(&self) -> Option<&Path> {
        let worktree = self.worktree_metadata_dir.as_deref()?;
        if is_within(worktree, &self.metadata_dir) {
            Some(&self.metadata_dir)
        } else {
            Some(worktree)
        }
    }
}

fn absolute(what: &str, path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        return Err(RepoWatchError::InvalidPaths(format!(
            "{what} must be absolute (got {:?})",
            path
        )));
    }
    Ok(normalize(path))
}

fn parse_gitdir(contents: &str) -> Option<&str> {
    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix(GITDIR_PREFIX))
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
}
