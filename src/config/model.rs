// src/config/model.rs

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Result;
use crate::watch::classifier::IgnoreRules;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// poll_interval_ms = 1000
/// ignored_subtrees = ["Library", "Temp", ".vs", ".idea"]
/// ignored_name_prefixes = ["~UnityDirMonSync", ".vs"]
/// ignored_globs = ["**/*.tmp"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// How long the background loop waits between passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directories (relative to the repository root) whose contents never
    /// count as working-tree changes, e.g. build output.
    #[serde(default = "default_ignored_subtrees")]
    pub ignored_subtrees: Vec<String>,

    /// File-name prefixes of sync markers and editor scratch files.
    #[serde(default = "default_ignored_name_prefixes")]
    pub ignored_name_prefixes: Vec<String>,

    /// Extra glob patterns, matched against root-relative paths.
    #[serde(default)]
    pub ignored_globs: Vec<String>,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_ignored_subtrees() -> Vec<String> {
    ["Library", "Temp", ".vs", ".idea"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_ignored_name_prefixes() -> Vec<String> {
    ["~UnityDirMonSync", ".vs"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ignored_subtrees: default_ignored_subtrees(),
            ignored_name_prefixes: default_ignored_name_prefixes(),
            ignored_globs: Vec::new(),
        }
    }
}

/// Validated configuration. Obtain one through `TryFrom<RawConfigFile>`
/// (see `validate.rs`) or [`ConfigFile::default`].
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchSection) -> Self {
        Self { watch }
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }

    /// Build the classifier's ignore rules, anchoring subtrees at `root`.
    pub fn ignore_rules(&self, root: &Path) -> Result<IgnoreRules> {
        let mut rules = IgnoreRules::new();
        for subtree in &self.watch.ignored_subtrees {
            rules = rules.subtree(root.join(subtree));
        }
        for prefix in &self.watch.ignored_name_prefixes {
            rules = rules.name_prefix(prefix.as_str());
        }
        rules.globs(&self.watch.ignored_globs)
    }
}
