// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoWatchError {
    /// A notification source could not be opened.
    #[error("Failed to initialize notification source for {path:?}: {reason}")]
    Initialization { path: PathBuf, reason: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A single raw event could not be resolved to a path. Never aborts a pass.
    #[error("Processing fault for {path:?}: {reason}")]
    ProcessingFault { path: PathBuf, reason: String },

    #[error("Invalid repository paths: {0}")]
    InvalidPaths(String),

    #[error("Not a repository: {0:?}")]
    NotARepository(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RepoWatchError>;
