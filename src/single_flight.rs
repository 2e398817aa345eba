//! Memoized initializer that runs at most one initialization at a time.
//!
//! The first caller runs the initializer; callers that arrive while it is in
//! flight block until it finishes and share its outcome, success or failure.
//! A success is kept for the lifetime of the value. A failure is not: the next
//! caller after a failed attempt starts a fresh one.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct InitError {
    message: String,
}

impl InitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

enum Slot<T> {
    Empty,
    Loading,
    Ready(Arc<T>),
}

struct State<T> {
    slot: Slot<T>,
    attempt: u64,
    last_failure: Option<(u64, InitError)>,
}

pub struct SingleFlight<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                slot: Slot::Empty,
                attempt: 0,
                last_failure: None,
            }),
            settled: Condvar::new(),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        match &self.lock().slot {
            Slot::Ready(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.lock().slot, Slot::Ready(_))
    }

    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>, InitError>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        let mut state = self.lock();
        loop {
            if let Slot::Ready(v) = &state.slot {
                return Ok(Arc::clone(v));
            }
            if !matches!(state.slot, Slot::Loading) {
                break;
            }
            let waiting_on = state.attempt;
            state = self
                .settled
                .wait_while(state, |s| matches!(s.slot, Slot::Loading))
                .unwrap_or_else(PoisonError::into_inner);
            if let Some((attempt, err)) = &state.last_failure {
                if *attempt == waiting_on {
                    return Err(err.clone());
                }
            }
        }

        state.attempt += 1;
        let attempt = state.attempt;
        state.slot = Slot::Loading;
        drop(state);

        let mut guard = LoadingGuard {
            flight: self,
            armed: true,
        };
        let result = init();
        guard.armed = false;

        let mut state = self.lock();
        let out = match result {
            Ok(value) => {
                let value = Arc::new(value);
                state.slot = Slot::Ready(Arc::clone(&value));
                state.last_failure = None;
                Ok(value)
            }
            Err(e) => {
                let err = InitError::new(format!("{e:#}"));
                state.slot = Slot::Empty;
                state.last_failure = Some((attempt, err.clone()));
                Err(err)
            }
        };
        drop(state);
        self.settled.notify_all();
        out
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Puts the slot back to `Empty` if the initializer unwinds, so waiters wake.
struct LoadingGuard<'a, T> {
    flight: &'a SingleFlight<T>,
    armed: bool,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.flight.lock();
            state.slot = Slot::Empty;
            drop(state);
            self.flight.settled.notify_all();
        }
    }
}
