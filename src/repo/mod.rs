// src/repo/mod.rs

//! Repository layout: where the working tree, metadata directory and the
//! well-known metadata files live, for regular repositories and linked
//! worktrees alike.

pub mod paths;

pub use paths::RepositoryPaths;
