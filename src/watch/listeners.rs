// src/watch/listeners.rs

//! Per-kind observer lists.
//!
//! Listeners are zero-argument callbacks. Each kind keeps its listeners in
//! subscription order; `clear` drops every registration at teardown.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::types::SemanticEventKind;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`ListenerRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    /// Bumped by `clear`; a `fire` in progress stops once it changes.
    generation: u64,
    table: HashMap<SemanticEventKind, Vec<(ListenerId, Listener)>>,
}

#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<RegistryInner>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let counts: HashMap<_, _> = inner
            .table
            .iter()
            .map(|(kind, list)| (*kind, list.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: SemanticEventKind, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .table
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove one registration. Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        for list in inner.table.values_mut() {
            if let Some(pos) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: SemanticEventKind) -> usize {
        self.lock().table.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every registration. A concurrent `fire` invokes no further
    /// listeners once this returns.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.table.clear();
        inner.generation += 1;
    }

    /// Invoke every listener of `kind` in subscription order.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe. A panicking listener is logged and not counted. Stops
    /// early if the registry is cleared meanwhile. Returns the number of
    /// listeners that completed.
    pub fn fire(&self, kind: SemanticEventKind) -> usize {
        let (generation, snapshot) = {
            let inner = self.lock();
            let listeners: Vec<Listener> = inner
                .table
                .get(&kind)
                .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
                .unwrap_or_default();
            (inner.generation, listeners)
        };

        let mut invoked = 0;
        for listener in snapshot {
            if self.lock().generation != generation {
                debug!(kind = %kind, "listeners cleared mid-dispatch");
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| listener())) {
                Ok(()) => invoked += 1,
                Err(_) => error!(kind = %kind, "listener panicked"),
            }
        }
        invoked
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_in_subscription_order() {
        let registry = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            registry.subscribe(SemanticEventKind::HeadChanged, move || {
                order.lock().unwrap().push(tag);
            });
        }

        assert_eq!(registry.fire(SemanticEventKind::HeadChanged), 2);
        assert_eq!(registry.fire(SemanticEventKind::IndexChanged), 0);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_and_clear() {
        let registry = ListenerRegistry::new();
        let a = registry.subscribe(SemanticEventKind::ConfigChanged, || {});
        registry.subscribe(SemanticEventKind::ConfigChanged, || {});

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        assert_eq!(registry.listener_count(SemanticEventKind::ConfigChanged), 1);

        registry.clear();
        assert_eq!(registry.listener_count(SemanticEventKind::ConfigChanged), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        registry.subscribe(SemanticEventKind::RepositoryChanged, || panic!("boom"));
        let c = Arc::clone(&calls);
        registry.subscribe(SemanticEventKind::RepositoryChanged, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.fire(SemanticEventKind::RepositoryChanged), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_during_fire_skips_the_remaining_listeners() {
        let registry = Arc::new(ListenerRegistry::new());
        let later = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        registry.subscribe(SemanticEventKind::HeadChanged, move || reg.clear());
        let l = Arc::clone(&later);
        registry.subscribe(SemanticEventKind::HeadChanged, move || {
            l.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.fire(SemanticEventKind::HeadChanged), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(registry.listener_count(SemanticEventKind::HeadChanged), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself_while_firing() {
        let registry = Arc::new(ListenerRegistry::new());
        let slot = Arc::new(Mutex::new(None));

        let reg = Arc::clone(&registry);
        let s = Arc::clone(&slot);
        let id = registry.subscribe(SemanticEventKind::IndexChanged, move || {
            if let Some(id) = s.lock().unwrap().take() {
                reg.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(registry.fire(SemanticEventKind::IndexChanged), 1);
        assert_eq!(registry.listener_count(SemanticEventKind::IndexChanged), 0);
    }
}
