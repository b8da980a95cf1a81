#![allow(dead_code, unused_imports)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use repowatch::fs::mock::MockFileSystem;
use repowatch::repo::RepositoryPaths;
use repowatch::types::SemanticEventKind;
use repowatch::watch::RepositoryWatcher;

pub use repowatch_test_utils::builders;
pub use repowatch_test_utils::scripted_source::{ScriptedSource, ScriptedSourceFactory};
pub use repowatch_test_utils::{init_tracing, with_timeout};

/// Watcher over scripted sources and an in-memory filesystem.
pub fn scripted_watcher(
    paths: RepositoryPaths,
    factory: &Arc<ScriptedSourceFactory>,
) -> RepositoryWatcher {
    RepositoryWatcher::builder(paths)
        .source_factory(factory.clone())
        .file_system(Arc::new(MockFileSystem::new()))
        .poll_interval(Duration::from_millis(20))
        .build()
        .unwrap()
}

/// Records every listener invocation, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    fired: Arc<Mutex<Vec<SemanticEventKind>>>,
}

impl Recorder {
    /// Subscribe one recording listener for every kind.
    pub fn attach(watcher: &RepositoryWatcher) -> Self {
        let recorder = Self::default();
        for kind in SemanticEventKind::ALL {
            recorder.attach_kind(watcher, kind);
        }
        recorder
    }

    pub fn attach_kind(&self, watcher: &RepositoryWatcher, kind: SemanticEventKind) {
        let fired = Arc::clone(&self.fired);
        watcher.subscribe(kind, move || fired.lock().unwrap().push(kind));
    }

    pub fn fired(&self) -> Vec<SemanticEventKind> {
        self.fired.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<SemanticEventKind> {
        std::mem::take(&mut *self.fired.lock().unwrap())
    }
}

/// Poll `cond` every 10ms until it holds or `deadline` passes.
pub async fn eventually(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    loop {
        if cond() {
            return true;
        }
        if start.elapsed() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
