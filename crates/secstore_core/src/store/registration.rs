//! Per-store initialization state machine.
//!
//! `Uninitialized -> Initializing -> Ready`, or `-> Failed` when the first-use
//! hook errors. One mutex guards the state; callers that arrive while another
//! thread is initializing wait on the condvar for the outcome.

use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistrationState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// What the caller of `Registration::begin` must do next.
#[derive(Debug)]
pub(crate) enum Admission<'a> {
    /// Caller owns initialization and reports the outcome through the guard.
    Initialize(InitGuard<'a>),
    AlreadyReady,
    AlreadyFailed,
}

/// Ownership of an in-flight initialization.
///
/// Dropping the guard without `complete` (early return, panic in the hook)
/// marks the store `Failed` and wakes waiters.
#[derive(Debug)]
pub(crate) struct InitGuard<'a> {
    registration: &'a Registration,
    completed: bool,
}

impl InitGuard<'_> {
    pub(crate) fn complete(mut self, succeeded: bool) {
        self.completed = true;
        self.registration.finish(succeeded);
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.registration.finish(false);
        }
    }
}

#[derive(Debug)]
pub(crate) struct Registration {
    state: Mutex<RegistrationState>,
    changed: Condvar,
}

impl Registration {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistrationState::Uninitialized),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> RegistrationState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn begin(&self) -> Admission<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let current = *state;
            match current {
                RegistrationState::Initializing => {
                    state = self
                        .changed
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                RegistrationState::Uninitialized => {
                    *state = RegistrationState::Initializing;
                    return Admission::Initialize(InitGuard {
                        registration: self,
                        completed: false,
                    });
                }
                RegistrationState::Ready => return Admission::AlreadyReady,
                RegistrationState::Failed => return Admission::AlreadyFailed,
            }
        }
    }

    fn finish(&self, succeeded: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = if succeeded {
            RegistrationState::Ready
        } else {
            RegistrationState::Failed
        };
        self.changed.notify_all();
    }
}
