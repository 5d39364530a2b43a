//! Deferred continuations on the dispatcher.
//!
//! "Run this on the dispatcher no earlier than now + delay" is modelled as a
//! tokio sleep task that posts a [`HarnessEvent::Timer`] back into the
//! dispatcher's channel. The continuation itself runs in the dispatch loop,
//! serialized with every other event.
//!
//! Cancelling aborts the sleep task and forgets the id. A timer that already
//! posted its event before the cancel is dropped when it is claimed through
//! [`Schedule::fire`].

use crate::event::{Deferred, HarnessEvent};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Identifier of a scheduled continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw id value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Timer facility used by the navigator
pub trait Schedule {
    /// Schedule `task` to be delivered after `delay`
    fn schedule(&mut self, delay: Duration, task: Deferred) -> TimerId;

    /// Cancel a timer; returns false if it already fired or was cancelled
    fn cancel(&mut self, id: TimerId) -> bool;

    /// Claim a delivered timer; returns false if it was cancelled meanwhile
    fn fire(&mut self, id: TimerId) -> bool;
}

/// Scheduler backed by tokio tasks on the dispatcher's runtime
#[derive(Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<HarnessEvent>,
    next_id: u64,
    live: HashMap<TimerId, AbortHandle>,
}

impl TokioScheduler {
    /// Create a scheduler posting into `tx`
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<HarnessEvent>) -> Self {
        Self {
            tx,
            next_id: 0,
            live: HashMap::new(),
        }
    }

    /// Number of timers not yet fired or cancelled
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.live.len()
    }

    /// Cancel every live timer
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.live.drain() {
            handle.abort();
        }
    }
}

impl Schedule for TokioScheduler {
    fn schedule(&mut self, delay: Duration, task: Deferred) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(HarnessEvent::Timer { id, task });
        });
        self.live.insert(id, handle.abort_handle());
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        match self.live.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn fire(&mut self, id: TimerId) -> bool {
        self.live.remove(&id).is_some()
    }
}

/// Virtual-time scheduler for deterministic state machine tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualScheduler {
    pub(crate) now: Duration,
    next_id: u64,
    pending: std::collections::BTreeMap<TimerId, (Duration, Deferred)>,
}

#[cfg(test)]
impl ManualScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Earliest pending timer due at or before `limit`
    pub(crate) fn next_due(&self, limit: Duration) -> Option<(TimerId, Duration, Deferred)> {
        self.pending
            .iter()
            .filter(|(_, (due, _))| *due <= limit)
            .min_by_key(|(id, (due, _))| (*due, **id))
            .map(|(id, (due, task))| (*id, *due, *task))
    }

    pub(crate) fn pending_tasks(&self) -> Vec<Deferred> {
        self.pending.values().map(|(_, task)| *task).collect()
    }
}

#[cfg(test)]
impl Schedule for ManualScheduler {
    fn schedule(&mut self, delay: Duration, task: Deferred) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, (self.now + delay, task));
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }

    fn fire(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }
}
