// src/config/validate.rs

use std::path::{Component, Path};

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile, WatchSection};
use crate::errors::{RepoWatchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RepoWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch))
    }
}

pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_poll_interval(&cfg.watch)?;
    validate_subtrees(&cfg.watch)?;
    validate_prefixes(&cfg.watch)?;
    validate_globs(&cfg.watch)?;
    Ok(())
}

fn validate_poll_interval(watch: &WatchSection) -> Result<()> {
    if watch.poll_interval_ms == 0 {
        return Err(RepoWatchError::ConfigError(
            "[watch].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_subtrees(watch: &WatchSection) -> Result<()> {
    for subtree in &watch.ignored_subtrees {
        let path = Path::new(subtree);
        if subtree.trim().is_empty() || path.is_absolute() || path.has_root() {
            return Err(RepoWatchError::ConfigError(format!(
                "[watch].ignored_subtrees entry '{}' must be a non-empty path relative to the repository root",
                subtree
            )));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(RepoWatchError::ConfigError(format!(
                "[watch].ignored_subtrees entry '{}' must not contain '..'",
                subtree
            )));
        }
    }
    Ok(())
}

fn validate_prefixes(watch: &WatchSection) -> Result<()> {
    if watch.ignored_name_prefixes.iter().any(|p| p.is_empty()) {
        // An empty prefix would swallow every working-tree change.
        return Err(RepoWatchError::ConfigError(
            "[watch].ignored_name_prefixes must not contain an empty string".to_string(),
        ));
    }
    Ok(())
}

fn validate_globs(watch: &WatchSection) -> Result<()> {
    for pattern in &watch.ignored_globs {
        Glob::new(pattern).map_err(|e| {
            RepoWatchError::ConfigError(format!(
                "[watch].ignored_globs pattern '{}' is invalid: {}",
                pattern, e
            ))
        })?;
    }
    Ok(())
}
