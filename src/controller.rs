// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile loop: informer -> work queue -> workers -> provider adapter.
//!
//! # Lifecycle
//!
//! 1. Spawn the informer pump, which turns watch notifications into queued transitions
//! 2. Wait until the informer reports its initial list as complete (bounded)
//! 3. Start the workers
//! 4. On the stop signal: shut the queue down and wait for in-flight items
//!
//! # Retry Ceiling
//!
//! A key is attempted at most [`MAX_ATTEMPTS`] times. Each failed attempt below the
//! ceiling is requeued with the queue's rate-limited delay; the last failure drops the
//! item and clears its retry state. Errors the API will never accept are dropped at once.

use futures::Stream;
use kube::runtime::{reflector::Store, watcher};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::constants::{
    DEFAULT_APPLY_TIMEOUT_SECS, DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_WORKERS, MAX_ATTEMPTS,
};
use crate::dns::WorkItem;
use crate::errors::{ControllerError, ProviderError};
use crate::extractor::{extract, Transition};
use crate::informer::{has_synced, Informer};
use crate::metrics;
use crate::provider::ProviderAdapter;
use crate::snapshot::{Markers, SnapshotSource};
use crate::workqueue::{RateLimiterConfig, WorkQueue};

/// Tunables of the reconcile loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub workers: usize,
    pub cache_sync_timeout: Duration,
    /// Upper bound for one provider apply
    pub apply_timeout: Duration,
    pub max_attempts: u32,
    pub rate_limiter: RateLimiterConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cache_sync_timeout: Duration::from_secs(DEFAULT_CACHE_SYNC_TIMEOUT_SECS),
            apply_timeout: Duration::from_secs(DEFAULT_APPLY_TIMEOUT_SECS),
            max_attempts: MAX_ATTEMPTS,
            rate_limiter: RateLimiterConfig::default(),
        }
    }
}

/// Reconciles one resource kind against the DNS provider.
pub struct Controller {
    kind: &'static str,
    queue: Arc<WorkQueue<Transition>>,
    provider: Arc<ProviderAdapter>,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(kind: &'static str, provider: Arc<ProviderAdapter>, config: ControllerConfig) -> Self {
        let queue = WorkQueue::new(&config.rate_limiter);
        Self {
            kind,
            queue,
            provider,
            config,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<WorkQueue<Transition>> {
        &self.queue
    }

    /// Run until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::CacheSyncFailed`] when the initial list does not complete
    /// within the configured timeout or the stop signal arrives first, and
    /// [`ControllerError::WorkerFailed`] when a worker task panicked.
    pub async fn run<K, S, F>(self, stream: S, markers: Markers, shutdown: F) -> Result<(), ControllerError>
    where
        K: SnapshotSource,
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
        F: Future<Output = ()>,
    {
        let controller = Arc::new(self);
        info!(kind = controller.kind, workers = controller.config.workers, "Starting controller");

        let informer = Informer::<K>::new(markers);
        let store = informer.store();
        let mut pump = {
            let queue = Arc::clone(&controller.queue);
            let kind = controller.kind;
            tokio::spawn(informer.run(stream, move |notification| {
                let (key, transition) = notification.into_work();
                let accepted = queue.add(key, transition);
                if accepted {
                    metrics::record_queue_add(kind, queue.len());
                }
                accepted
            }))
        };

        tokio::pin!(shutdown);
        let synced = tokio::select! {
            result = wait_for_cache_sync(&store, controller.config.cache_sync_timeout) => result,
            () = &mut shutdown => Err(ControllerError::CacheSyncFailed {
                reason: "stop requested before the initial list completed".to_string(),
            }),
        };
        if let Err(e) = synced {
            error!(kind = controller.kind, error = %e, "Controller not started");
            controller.queue.shut_down();
            pump.abort();
            return Err(e);
        }

        info!(kind = controller.kind, "Caches synced, starting workers");
        let workers: Vec<JoinHandle<()>> = (0..controller.config.workers.max(1))
            .map(|id| {
                let controller = Arc::clone(&controller);
                tokio::spawn(async move { controller.worker(id).await })
            })
            .collect();

        tokio::select! {
            () = &mut shutdown => info!(kind = controller.kind, "Stop requested, shutting down controller"),
            _ = &mut pump => warn!(kind = controller.kind, "Watch stream ended, shutting down controller"),
        }

        controller.queue.shut_down();
        pump.abort();

        let in_flight = controller.queue.in_flight();
        if in_flight > 0 {
            info!(kind = controller.kind, in_flight = in_flight, "Waiting for in-flight DNS changes");
        }
        controller.queue.drained().await;

        let mut failure = None;
        for worker in workers {
            if let Err(e) = worker.await {
                error!(kind = controller.kind, error = %e, "Worker task failed");
                failure.get_or_insert(ControllerError::WorkerFailed {
                    reason: e.to_string(),
                });
            }
        }
        info!(kind = controller.kind, "Controller stopped");

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn worker(&self, id: usize) {
        debug!(kind = self.kind, worker = id, "Worker started");
        while let Some((key, transition)) = self.queue.get().await {
            metrics::set_queue_depth(self.kind, self.queue.len());
            let item = WorkItem {
                key,
                changes: extract(&transition),
            };
            self.process(&item, transition).await;
            self.queue.done(&item.key);
        }
        debug!(kind = self.kind, worker = id, "Worker stopped");
    }

    /// Apply one dequeued work item and decide whether its transition needs another
    /// attempt.
    async fn process(&self, item: &WorkItem, transition: Transition) {
        let WorkItem { key, changes } = item;
        if changes.is_empty() {
            debug!(kind = self.kind, key = %key, "No DNS changes");
            metrics::record_reconciliation_noop(self.kind);
            self.queue.forget(key);
            return;
        }

        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.config.apply_timeout,
            self.provider.apply_changes(changes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                timeout_secs: self.config.apply_timeout.as_secs(),
            }),
        };

        match result {
            Ok(summary) => {
                metrics::record_reconciliation_success(self.kind, start.elapsed());
                info!(
                    kind = self.kind,
                    key = %key,
                    changes = changes.kind(),
                    deleted = summary.deleted,
                    upserted = summary.upserted,
                    failed = summary.failed,
                    ignored = summary.ignored,
                    "Applied DNS changes"
                );
                self.queue.forget(key);
            }
            Err(e) => {
                metrics::record_reconciliation_error(self.kind, start.elapsed());
                self.handle_failure(key, transition, &e);
            }
        }
    }

    fn handle_failure(&self, key: &str, transition: Transition, error: &ProviderError) {
        let attempt = self.queue.num_requeues(key) + 1;

        if error.is_transient() && attempt < self.config.max_attempts {
            if self.queue.add_rate_limited(key, transition) {
                metrics::record_queue_retry(self.kind);
                warn!(kind = self.kind, key = %key, attempt = attempt, error = %error, "Failed to apply DNS changes, retrying");
            }
            return;
        }

        error!(
            kind = self.kind,
            key = %key,
            attempt = attempt,
            error = %error,
            "Dropping DNS changes after failed attempts"
        );
        metrics::record_queue_drop(self.kind);
        self.queue.forget(key);
    }
}

/// Wait until the informer cache behind `store` has listed every object, or fail after
/// `timeout`.
///
/// # Errors
///
/// Returns [`ControllerError::CacheSyncFailed`] on timeout, or when the informer stopped
/// before its initial list completed.
pub async fn wait_for_cache_sync<K: SnapshotSource>(
    store: &Store<K>,
    timeout: Duration,
) -> Result<(), ControllerError> {
    if has_synced(store) {
        return Ok(());
    }
    debug!(timeout_secs = timeout.as_secs(), "Waiting for the initial list");

    match tokio::time::timeout(timeout, store.wait_until_ready()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(ControllerError::CacheSyncFailed {
            reason: "watch stream ended before the initial list completed".to_string(),
        }),
        Err(_) => Err(ControllerError::CacheSyncFailed {
            reason: format!("timed out after {}s", timeout.as_secs()),
        }),
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
