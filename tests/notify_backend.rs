mod common;
use crate::common::{eventually, init_tracing, Recorder};

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use repowatch::fs::RealFileSystem;
use repowatch::repo::RepositoryPaths;
use repowatch::types::SemanticEventKind::*;
use repowatch::watch::RepositoryWatcher;

fn scratch_repo() -> (TempDir, RepositoryPaths) {
    let dir = tempfile::tempdir().unwrap();
    let git = dir.path().join(".git");
    fs::create_dir_all(git.join("refs").join("heads")).unwrap();
    fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    fs::write(git.join("config"), "[core]\n").unwrap();

    let paths = RepositoryPaths::discover(&RealFileSystem, dir.path()).unwrap();
    (dir, paths)
}

fn real_watcher(paths: RepositoryPaths) -> RepositoryWatcher {
    RepositoryWatcher::builder(paths)
        .file_system(Arc::new(RealFileSystem))
        .poll_interval(Duration::from_millis(20))
        .build()
        .unwrap()
}

#[tokio::test]
async fn head_write_is_reported() {
    init_tracing();
    let (dir, paths) = scratch_repo();
    let head = paths.head().to_path_buf();
    let watcher = real_watcher(paths);
    let recorder = Recorder::attach(&watcher);
    watcher.initialize().unwrap();

    // Let the backend settle before touching anything.
    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(&head, "ref: refs/heads/topic\n").unwrap();

    let mut seen = false;
    for _ in 0..100 {
        watcher.check_and_process_events().await;
        if recorder.fired().contains(&HeadChanged) {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seen, "HEAD change under {:?} was not reported", dir.path());
}

#[tokio::test]
async fn working_tree_file_is_reported_by_the_loop() {
    let (dir, paths) = scratch_repo();
    let watcher = real_watcher(paths);
    let recorder = Recorder::attach(&watcher);
    watcher.initialize().unwrap();
    watcher.start().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    assert!(
        eventually(Duration::from_secs(5), || recorder
            .fired()
            .contains(&RepositoryChanged))
        .await
    );

    watcher.stop();
    watcher.wait_for_loop_exit().await;
}

#[tokio::test]
async fn new_directories_are_not_working_tree_changes() {
    let (dir, paths) = scratch_repo();
    let watcher = real_watcher(paths);
    let recorder = Recorder::attach(&watcher);
    watcher.initialize().unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    fs::create_dir(dir.path().join("empty")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    watcher.check_and_process_events().await;
    assert!(!recorder.fired().contains(&RepositoryChanged));
}

#[test]
fn discovery_rejects_plain_directories() {
    let dir = tempfile::tempdir().unwrap();
    assert!(RepositoryPaths::discover(&RealFileSystem, dir.path()).is_err());
}
