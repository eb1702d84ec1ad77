// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rate-limited, retrying work queue keyed by resource identity.
//!
//! The queue stores at most one payload per key. A payload added for a key that is
//! already waiting is merged into it through [`Coalesce`], so two watch events for the
//! same object collapse into a single unit of work and a stale diff can never be applied
//! after a newer one.
//!
//! # Key States
//!
//! ```text
//! add ──► Queued ──get──► Processing ──done──► (gone)
//!           ▲                 │
//!           │                 └─add_rate_limited──► Parked ──delay──┐
//!           └───────────────────────────────────────────────────────┘
//! ```
//!
//! - A key is never handed to two workers at once. Payloads added while a key is
//!   processing are held back until the worker calls [`WorkQueue::done`].
//! - A new payload for a parked key ends the backoff wait immediately.
//! - Retry counters live inside the queue and are only touched under its lock.
//!
//! # Shutdown
//!
//! [`WorkQueue::shut_down`] rejects further adds, wakes every waiting worker with `None`
//! and discards work that has not started. [`WorkQueue::drained`] resolves once the
//! in-flight items are done.

pub mod rate_limiter;

pub use rate_limiter::{RateLimiter, RateLimiterConfig};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::extractor::Transition;

/// Payloads that can be merged when several arrive for the same key.
pub trait Coalesce: Send + 'static {
    /// Merge `newer` into `self`, keeping the effect of applying both in order.
    #[must_use]
    fn coalesce(self, newer: Self) -> Self;
}

impl Coalesce for Transition {
    fn coalesce(self, newer: Self) -> Self {
        Transition::coalesce(self, newer)
    }
}

struct State<T> {
    ready: VecDeque<String>,
    pending: HashMap<String, T>,
    parked: HashMap<String, (T, u64)>,
    processing: HashSet<String>,
    rate_limiter: RateLimiter,
    park_generation: u64,
    shutting_down: bool,
}

impl<T: Coalesce> State<T> {
    /// Store `payload` as the newest data for `key` and make the key ready if possible.
    ///
    /// Returns `true` when the key was pushed onto the ready queue.
    fn insert(&mut self, key: String, payload: T) -> bool {
        match self.pending.remove(&key) {
            Some(existing) => {
                self.pending.insert(key, existing.coalesce(payload));
                false
            }
            None => {
                let schedule = !self.processing.contains(&key);
                if schedule {
                    self.ready.push_back(key.clone());
                }
                self.pending.insert(key, payload);
                schedule
            }
        }
    }
}

/// Shared queue of keyed work.
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    ready_notify: Notify,
    idle_notify: Notify,
}

impl<T: Coalesce> WorkQueue<T> {
    #[must_use]
    pub fn new(config: &RateLimiterConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                ready: VecDeque::new(),
                pending: HashMap::new(),
                parked: HashMap::new(),
                processing: HashSet::new(),
                rate_limiter: RateLimiter::new(config),
                park_generation: 0,
                shutting_down: false,
            }),
            ready_notify: Notify::new(),
            idle_notify: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add work for `key`. Returns `false` once the queue is shutting down.
    pub fn add(&self, key: impl Into<String>, payload: T) -> bool {
        let key = key.into();
        let mut state = self.lock();
        if state.shutting_down {
            debug!(key = %key, "Queue is shutting down, rejecting add");
            return false;
        }

        // Fresh data supersedes a backoff wait; the parked payload is the older half
        let payload = match state.parked.remove(&key) {
            Some((parked, _)) => parked.coalesce(payload),
            None => payload,
        };

        if state.insert(key, payload) {
            drop(state);
            self.ready_notify.notify_one();
        }
        true
    }

    /// Park a failed payload and make its key ready again after the rate-limited delay.
    ///
    /// Increments the key's requeue count. If newer data arrived while the key was being
    /// processed, the failed payload is merged in front of it and the key is requeued
    /// by [`WorkQueue::done`] without waiting.
    pub fn add_rate_limited(self: &Arc<Self>, key: impl Into<String>, payload: T) -> bool {
        let key = key.into();
        let mut state = self.lock();
        if state.shutting_down {
            return false;
        }

        let delay = state.rate_limiter.when(&key);

        if let Some(newer) = state.pending.remove(&key) {
            state.pending.insert(key, payload.coalesce(newer));
            return true;
        }

        state.park_generation += 1;
        let generation = state.park_generation;
        state.parked.insert(key.clone(), (payload, generation));
        drop(state);

        trace!(key = %key, delay = ?delay, "Parked key for backoff");
        let queue = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::unpark(&queue, &key, generation);
        });
        true
    }

    fn unpark(queue: &Weak<Self>, key: &str, generation: u64) {
        let Some(queue) = queue.upgrade() else {
            return;
        };
        let mut state = queue.lock();
        if state.shutting_down {
            return;
        }
        let current = state
            .parked
            .get(key)
            .is_some_and(|(_, parked_generation)| *parked_generation == generation);
        if !current {
            // Superseded by a later add or park
            return;
        }
        if let Some((payload, _)) = state.parked.remove(key) {
            if state.insert(key.to_string(), payload) {
                drop(state);
                queue.ready_notify.notify_one();
            }
        }
    }

    /// Wait for the next ready key. Returns `None` once the queue is shutting down.
    pub async fn get(&self) -> Option<(String, T)> {
        loop {
            let notified = self.ready_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                while let Some(key) = state.ready.pop_front() {
                    if let Some(payload) = state.pending.remove(&key) {
                        state.processing.insert(key.clone());
                        return Some((key, payload));
                    }
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as no longer processing. Work that arrived meanwhile becomes ready.
    pub fn done(&self, key: &str) {
        let mut state = self.lock();
        state.processing.remove(key);

        let requeue = !state.shutting_down && state.pending.contains_key(key);
        if requeue {
            state.ready.push_back(key.to_string());
        }
        let idle = state.processing.is_empty();
        drop(state);

        if requeue {
            self.ready_notify.notify_one();
        }
        if idle {
            self.idle_notify.notify_waiters();
        }
    }

    /// Clear the retry bookkeeping of `key`.
    pub fn forget(&self, key: &str) {
        self.lock().rate_limiter.forget(key);
    }

    /// How many times `key` has been requeued after a failure.
    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.lock().rate_limiter.num_requeues(key)
    }

    /// Number of keys ready to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently held by workers.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().processing.len()
    }

    /// Stop accepting and handing out work. In-flight items may still call `done`.
    pub fn shut_down(&self) {
        let mut state = self.lock();
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        let discarded = state.ready.len() + state.parked.len();
        state.ready.clear();
        state.pending.clear();
        state.parked.clear();
        drop(state);

        debug!(discarded = discarded, "Work queue shutting down");
        self.ready_notify.notify_waiters();
    }

    /// Resolve once no key is being processed.
    pub async fn drained(&self) {
        loop {
            let notified = self.idle_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.lock().processing.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
