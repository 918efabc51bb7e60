//! Stop gate - cancellation and "moving" bookkeeping for one axis.
//!
//! Every motion request takes a ticket (the current stop epoch). `stop()`
//! advances the epoch, so every ticket issued before it is cancelled, then
//! blocks until no motion holding an older ticket is running. A request
//! whose ticket is already stale never starts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct GateState {
    /// Ticket of the running motion, if any.
    active: Option<u64>,
}

/// Cancellation gate shared by the motion of one axis.
#[derive(Debug, Default)]
pub struct StopGate {
    epoch: AtomicU64,
    state: Mutex<GateState>,
    idle: Condvar,
}

/// Held while a motion runs; clears the moving flag on drop.
#[derive(Debug)]
pub struct ActiveMotion<'a> {
    gate: &'a StopGate,
}

impl StopGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a new motion request.
    #[inline]
    pub fn ticket(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// True once `stop()` has been called after `ticket` was issued.
    #[inline]
    pub fn is_cancelled(&self, ticket: u64) -> bool {
        self.epoch.load(Ordering::Acquire) != ticket
    }

    /// True while a motion runs.
    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Mark a motion as running. Returns `None` if the ticket is stale.
    pub fn begin(&self, ticket: u64) -> Option<ActiveMotion<'_>> {
        let mut state = self.lock();
        if self.is_cancelled(ticket) {
            return None;
        }
        state.active = Some(ticket);
        Some(ActiveMotion { gate: self })
    }

    /// Cancel every outstanding ticket and wait for the running motion to exit.
    pub fn stop(&self) {
        let mut state = self.lock();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        while state.active.is_some_and(|ticket| ticket < epoch) {
            state = self.idle.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ActiveMotion<'_> {
    fn drop(&mut self) {
        self.gate.lock().active = None;
        self.gate.idle.notify_all();
    }
}
