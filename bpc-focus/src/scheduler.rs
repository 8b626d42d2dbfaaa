//! Cancellable one-shot continuations
//!
//! Each scheduled task sleeps on the runtime clock and then posts a
//! `TimerEvent` back into the controller's queue. The controller decides what
//! the expiry means; the scheduler only guarantees:
//! - at most one outstanding task per `TaskKey`
//! - a newer request for the same key supersedes (aborts) the older one
//! - expiries from superseded or cancelled requests are rejected by `accept`

use crate::events::{RecoveryCategory, TimerEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Identity of a scheduled continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKey {
    /// Delayed recovery eligibility check
    Recovery(RecoveryCategory),
    /// Re-check of a noisy-route event after the route settles
    RouteSettle,
    /// Next crossfade volume step
    CrossfadeStep,
    /// Sleep timer target reached
    SleepTimer,
}

struct PendingTask {
    generation: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Keyed scheduler of delayed continuations
pub struct Scheduler {
    tx: mpsc::UnboundedSender<TimerEvent>,
    next_generation: u64,
    pending: HashMap<TaskKey, PendingTask>,
}

impl Scheduler {
    pub fn new(tx: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            tx,
            next_generation: 0,
            pending: HashMap::new(),
        }
    }

    /// Schedule `key` to expire after `delay`, superseding any pending request
    ///
    /// Returns the generation carried by the eventual `TimerEvent`.
    pub fn schedule(&mut self, key: TaskKey, delay: Duration) -> u64 {
        self.cancel(key);

        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = Instant::now() + delay;
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver gone means the controller already shut down
            let _ = tx.send(TimerEvent { key, generation });
        });

        trace!("Scheduled {:?} (generation {}) in {:?}", key, generation, delay);
        self.pending.insert(
            key,
            PendingTask {
                generation,
                deadline,
                handle,
            },
        );
        generation
    }

    /// Cancel the outstanding request for `key`; true if one existed
    pub fn cancel(&mut self, key: TaskKey) -> bool {
        match self.pending.remove(&key) {
            Some(task) => {
                task.handle.abort();
                trace!("Cancelled {:?} (generation {})", key, task.generation);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.pending.drain() {
            task.handle.abort();
        }
    }

    /// Accept an expiry if it belongs to the outstanding request for its key
    ///
    /// An accepted expiry clears the pending entry. Expiries that raced a
    /// cancel (already queued before the abort) are rejected.
    pub fn accept(&mut self, event: &TimerEvent) -> bool {
        match self.pending.get(&event.key) {
            Some(task) if task.generation == event.generation => {
                self.pending.remove(&event.key);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, key: TaskKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Time left until `key` expires
    pub fn remaining(&self, key: TaskKey) -> Option<Duration> {
        self.pending
            .get(&key)
            .map(|task| task.deadline.saturating_duration_since(Instant::now()))
    }

    pub fn pending_keys(&self) -> Vec<TaskKey> {
        let mut keys: Vec<TaskKey> = self.pending.keys().copied().collect();
        keys.sort_by_key(|k| format!("{:?}", k));
        keys
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
