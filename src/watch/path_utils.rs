// src/watch/path_utils.rs

//! Path helpers shared by repository discovery and classification.
//!
//! Everything here is lexical: no filesystem access, no symlink resolution.
//! Callers are expected to hand in absolute paths.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. A `..` at the root is discarded.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True if `path` lies strictly below `parent`.
pub fn is_child_of(path: &Path, parent: &Path) -> bool {
    path != parent && path.starts_with(parent)
}

/// True if `path` equals `base` or lies below it.
pub fn is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if `path` does not live under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
