//! Completion gate: the one-shot latch a test driver blocks on.
//!
//! The gate is the only state shared between the dispatcher thread and the
//! caller thread. Its lock guards the gate state and nothing else.
//!
//! ```text
//!   arm()          release(v)            reset()/arm()
//! Idle ───► Pending ─────────► Released(v) ─────────► Idle/Pending
//!   │          │
//!   └──────────┴──── close() ───► Closed (terminal)
//! ```
//!
//! Exactly one `Pending -> Released` transition happens per arming; every
//! later `release` is a no-op that reports `false`.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
enum GateState<T> {
    Idle,
    Pending,
    Released(T),
    Closed,
}

/// What a waiter observed when the gate let it through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateWait<T> {
    /// The armed navigation completed with this value
    Released(T),
    /// Nothing was armed
    Idle,
    /// The gate was closed because the harness shut down
    Closed,
}

/// Reason the gate refused to be armed or reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    /// A previous arming has not been released yet
    Pending,
    /// The gate is closed for good
    Closed,
}

/// Single-assignment, single-notification synchronization point
#[derive(Debug)]
pub struct CompletionGate<T> {
    state: Mutex<GateState<T>>,
    cond: Condvar,
}

impl<T: Clone> Default for CompletionGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> CompletionGate<T> {
    /// Create an idle gate
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Idle),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm the gate for a new navigation, discarding any previous value
    ///
    /// # Errors
    ///
    /// Refuses while a previous arming is still pending, or once closed
    pub fn arm(&self) -> Result<(), GateRefusal> {
        let mut state = self.lock();
        match *state {
            GateState::Pending => Err(GateRefusal::Pending),
            GateState::Closed => Err(GateRefusal::Closed),
            GateState::Idle | GateState::Released(_) => {
                *state = GateState::Pending;
                Ok(())
            }
        }
    }

    /// Return the gate to idle, discarding any released value
    ///
    /// # Errors
    ///
    /// Refuses while an arming is pending, or once closed
    pub fn reset(&self) -> Result<(), GateRefusal> {
        let mut state = self.lock();
        match *state {
            GateState::Pending => Err(GateRefusal::Pending),
            GateState::Closed => Err(GateRefusal::Closed),
            GateState::Idle | GateState::Released(_) => {
                *state = GateState::Idle;
                Ok(())
            }
        }
    }

    /// Release the pending arming with `value` and wake all waiters.
    ///
    /// Returns `true` if this call performed the transition. Releasing a gate
    /// that is not pending does nothing.
    pub fn release(&self, value: T) -> bool {
        let mut state = self.lock();
        if !matches!(*state, GateState::Pending) {
            return false;
        }
        *state = GateState::Released(value);
        drop(state);
        self.cond.notify_all();
        true
    }

    /// Close the gate permanently and wake all waiters
    pub fn close(&self) {
        let mut state = self.lock();
        *state = GateState::Closed;
        drop(state);
        self.cond.notify_all();
    }

    /// Whether no arming is pending
    #[must_use]
    pub fn is_done(&self) -> bool {
        !matches!(*self.lock(), GateState::Pending)
    }

    /// Whether an arming is pending
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.lock(), GateState::Pending)
    }

    /// Whether the gate has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), GateState::Closed)
    }

    /// Block until the gate is not pending.
    ///
    /// Spurious wakeups are absorbed by re-checking the state.
    pub fn wait(&self) -> GateWait<T> {
        let state = self
            .cond
            .wait_while(self.lock(), |s| matches!(s, GateState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        Self::observe(&state)
    }

    /// Block for at most `timeout`; `None` if still pending afterwards
    pub fn wait_timeout(&self, timeout: Duration) -> Option<GateWait<T>> {
        let (state, result) = self
            .cond
            .wait_timeout_while(self.lock(), timeout, |s| {
                matches!(s, GateState::Pending)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && matches!(*state, GateState::Pending) {
            return None;
        }
        Some(Self::observe(&state))
    }

    fn observe(state: &GateState<T>) -> GateWait<T> {
        match state {
            GateState::Released(value) => GateWait::Released(value.clone()),
            GateState::Idle | GateState::Pending => GateWait::Idle,
            GateState::Closed => GateWait::Closed,
        }
    }
}
