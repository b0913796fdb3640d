//! Start/stop gate for the security store.
//!
//! # Invariants
//! - Store operations are admitted only in `Started`.
//! - Concurrent `start` calls are serialized; the start hook of one call
//!   finishes before another caller observes the state.

use std::sync::{Mutex, PoisonError};

/// Answers whether store operations are currently admitted.
pub trait LifecycleGate: Send + Sync {
    fn is_started(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Started,
    Stopped,
    /// The last start hook returned an error.
    Failed,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::New),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `on_start` and opens the gate when it succeeds.
    ///
    /// Returns `Ok(false)` without running the hook when already started.
    pub fn start<F, E>(&self, on_start: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == LifecycleState::Started {
            return Ok(false);
        }

        match on_start() {
            Ok(()) => {
                *state = LifecycleState::Started;
                Ok(true)
            }
            Err(err) => {
                *state = LifecycleState::Failed;
                Err(err)
            }
        }
    }

    /// Closes the gate. Returns whether it was open.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let was_started = *state == LifecycleState::Started;
        if was_started {
            *state = LifecycleState::Stopped;
        }
        was_started
    }
}

impl LifecycleGate for Lifecycle {
    fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }
}
