// src/watch/gate.rs

//! At-most-one processing pass.
//!
//! The first caller to arrive owns the pass. Anyone arriving while it is in
//! flight waits for it to finish and gets that pass's result instead of
//! running a second, overlapping pass.

use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::watch::batch::EventBatchResult;

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    last: EventBatchResult,
}

#[derive(Debug, Default)]
pub struct PassGate {
    state: Mutex<GateState>,
    done: Notify,
}

impl PassGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().in_flight
    }

    /// Result of the most recently completed pass.
    pub fn last_result(&self) -> EventBatchResult {
        self.lock().last.clone()
    }

    /// Run `pass` unless one is already running, in which case wait for it.
    ///
    /// A waiter unblocks early when `cancel` fires and then returns the last
    /// known result.
    pub async fn run<F>(&self, cancel: &CancellationToken, pass: F) -> EventBatchResult
    where
        F: FnOnce() -> EventBatchResult,
    {
        let notified = self.done.notified();
        let mut notified = pin!(notified);

        let owner = {
            let mut state = self.lock();
            if state.in_flight {
                // Register before releasing the lock so the wake-up cannot be missed.
                notified.as_mut().enable();
                false
            } else {
                state.in_flight = true;
                true
            }
        };

        if !owner {
            debug!("processing pass in flight; waiting for its result");
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => debug!("cancelled while waiting for in-flight pass"),
            }
            return self.last_result();
        }

        let guard = PassGuard { gate: self };
        let result = pass();
        guard.gate.lock().last = result.clone();
        drop(guard);
        result
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag and wakes waiters, even if the pass panics.
struct PassGuard<'a> {
    gate: &'a PassGate,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.gate.lock().in_flight = false;
        self.gate.done.notify_waiters();
    }
}
