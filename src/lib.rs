// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod repo;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, load_or_default, ConfigFile};
use crate::fs::RealFileSystem;
use crate::repo::RepositoryPaths;
use crate::types::SemanticEventKind;
use crate::watch::{NotifySourceFactory, RepositoryWatcher};

pub use crate::errors::{RepoWatchError, Result as RepoWatchResult};
pub use crate::types::WatcherState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - repository discovery
/// - config loading
/// - the watcher over `notify`-backed sources
/// - one stdout-printing listener per event kind
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let fs = Arc::new(RealFileSystem);
    let paths = RepositoryPaths::discover(fs.as_ref(), &args.repo)?;
    let cfg = load_config(&args)?;

    if args.dry_run {
        print_dry_run(&paths, &cfg);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let mut builder = RepositoryWatcher::builder(paths)
        .config(&cfg)
        .source_factory(Arc::new(NotifySourceFactory))
        .file_system(fs)
        .cancellation(cancel.clone());
    if let Some(ms) = args.interval_ms {
        builder = builder.poll_interval(Duration::from_millis(ms));
    }
    let watcher = builder.build()?;

    for kind in SemanticEventKind::FIRING_ORDER {
        watcher.subscribe(kind, move || println!("[repowatch] {kind}"));
    }

    watcher.initialize()?;
    watcher.start()?;

    // Ctrl-C → graceful shutdown.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            cancel.cancel();
        });
    }

    watcher.wait_for_loop_exit().await;
    info!("watch loop finished; disposing");
    watcher.dispose();
    Ok(())
}

/// An explicit `--config` must exist; the implicit default may be absent.
fn load_config(args: &CliArgs) -> Result<ConfigFile> {
    let cfg = match &args.config {
        Some(path) => load_and_validate(PathBuf::from(path))?,
        None => load_or_default(default_config_path())?,
    };
    Ok(cfg)
}

/// Simple dry-run output: resolved paths, watch roots and ignore settings.
fn print_dry_run(paths: &RepositoryPaths, cfg: &ConfigFile) {
    println!("repowatch dry-run");
    println!("  root:            {}", paths.root().display());
    println!("  metadata dir:    {}", paths.metadata_dir().display());
    if let Some(dir) = paths.worktree_metadata_dir() {
        println!("  worktree dir:    {}", dir.display());
    }
    println!("  HEAD:            {}", paths.head().display());
    println!("  config:          {}", paths.config().display());
    println!("  index:           {}", paths.index().display());
    println!("  branches:        {}", paths.branches_dir().display());
    println!("  remotes:         {}", paths.remotes_dir().display());
    println!("  commit message:  {}", paths.commit_edit_msg().display());
    println!();

    println!("watch roots:");
    println!("  - {}", paths.primary_watch_root().display());
    if let Some(extra) = paths.secondary_watch_root() {
        println!("  - {}", extra.display());
    }
    println!();

    let watch = cfg.watch();
    println!("  poll_interval_ms = {}", watch.poll_interval_ms);
    println!("  ignored_subtrees = {:?}", watch.ignored_subtrees);
    println!("  ignored_name_prefixes = {:?}", watch.ignored_name_prefixes);
    if !watch.ignored_globs.is_empty() {
        println!("  ignored_globs = {:?}", watch.ignored_globs);
    }

    debug!("dry-run complete (no watching)");
}
