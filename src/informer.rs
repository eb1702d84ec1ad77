// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch-stream informer.
//!
//! Folds the raw [`watcher::Event`] stream of one resource kind into created, updated and
//! deleted notifications carrying [`ResourceSnapshot`]s. Objects are cached in a kube
//! [`reflector`] store: the previous version of an object is read from the store before
//! the event is written, so an update can be delivered with its old state. A relist after
//! a watch restart is diffed against the store contents from before the relist, so
//! objects that vanished while the watch was down are reported as deleted.
//!
//! The store becomes ready once the first full list has been written; see [`has_synced`].

use futures::{FutureExt, Stream, StreamExt};
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::watcher;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

use crate::extractor::Transition;
use crate::metrics;
use crate::snapshot::{resource_key, Markers, ResourceSnapshot, SnapshotSource};

/// A change observed on one watched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Created {
        key: String,
        snapshot: ResourceSnapshot,
    },
    Updated {
        key: String,
        old: ResourceSnapshot,
        new: ResourceSnapshot,
    },
    Deleted {
        key: String,
        snapshot: ResourceSnapshot,
    },
}

impl Notification {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Notification::Created { key, .. }
            | Notification::Updated { key, .. }
            | Notification::Deleted { key, .. } => key,
        }
    }

    /// Label used in logs and metrics
    #[must_use]
    pub fn event(&self) -> &'static str {
        match self {
            Notification::Created { .. } => "created",
            Notification::Updated { .. } => "updated",
            Notification::Deleted { .. } => "deleted",
        }
    }

    /// Split into the queue key and the transition to enqueue.
    #[must_use]
    pub fn into_work(self) -> (String, Transition) {
        match self {
            Notification::Created { key, snapshot } => (key, Transition::created(snapshot)),
            Notification::Updated { key, old, new } => (key, Transition::updated(old, new)),
            Notification::Deleted { key, snapshot } => (key, Transition::deleted(snapshot)),
        }
    }
}

/// Whether the informer behind `store` has completed its initial list.
#[must_use]
pub fn has_synced<K: SnapshotSource>(store: &Store<K>) -> bool {
    matches!(store.wait_until_ready().now_or_never(), Some(Ok(())))
}

/// Reflector-backed cache for one resource kind.
pub struct Informer<K: SnapshotSource> {
    markers: Markers,
    reader: Store<K>,
    writer: Writer<K>,
    synced: bool,
}

impl<K: SnapshotSource> Informer<K> {
    #[must_use]
    pub fn new(markers: Markers) -> Self {
        let (reader, writer) = reflector::store::<K>();
        Self {
            markers,
            reader,
            writer,
            synced: false,
        }
    }

    /// Read handle on the cache. Ready once the initial list is complete.
    #[must_use]
    pub fn store(&self) -> Store<K> {
        self.reader.clone()
    }

    /// Number of objects currently known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reader.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reader.is_empty()
    }

    /// Fold one watcher event into the cache and return the resulting notifications.
    pub fn handle(&mut self, event: watcher::Event<K>) -> Vec<Notification> {
        match &event {
            watcher::Event::Apply(obj) => {
                let key = resource_key(obj);
                let old = self.cached(obj);
                let new = obj.snapshot(&self.markers);
                self.writer.apply_watcher_event(&event);
                Self::observe(key, old, new).into_iter().collect()
            }
            watcher::Event::Delete(obj) => {
                let key = resource_key(obj);
                let snapshot = self
                    .cached(obj)
                    .unwrap_or_else(|| obj.snapshot(&self.markers));
                self.writer.apply_watcher_event(&event);
                vec![Notification::Deleted { key, snapshot }]
            }
            watcher::Event::Init => {
                debug!(kind = K::KIND, "Relist started");
                self.writer.apply_watcher_event(&event);
                Vec::new()
            }
            watcher::Event::InitApply(_) => {
                self.writer.apply_watcher_event(&event);
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(&event),
        }
    }

    fn cached(&self, obj: &K) -> Option<ResourceSnapshot> {
        self.reader
            .get(&ObjectRef::from_obj(obj))
            .map(|cached| cached.snapshot(&self.markers))
    }

    fn snapshots(&self) -> HashMap<String, ResourceSnapshot> {
        self.reader
            .state()
            .iter()
            .map(|obj| (resource_key(obj.as_ref()), obj.snapshot(&self.markers)))
            .collect()
    }

    fn observe(key: String, old: Option<ResourceSnapshot>, new: ResourceSnapshot) -> Option<Notification> {
        match old {
            None => Some(Notification::Created { key, snapshot: new }),
            Some(old) if old == new => {
                trace!(key = %key, "Snapshot unchanged");
                None
            }
            Some(old) => Some(Notification::Updated { key, old, new }),
        }
    }

    /// Swap the relisted objects into the store and report the difference.
    fn finish_relist(&mut self, event: &watcher::Event<K>) -> Vec<Notification> {
        let mut before = self.snapshots();
        self.writer.apply_watcher_event(event);
        let after = self.snapshots();

        let mut notifications = Vec::new();
        for (key, new) in after {
            let old = before.remove(&key);
            notifications.extend(Self::observe(key, old, new));
        }
        notifications.extend(
            before
                .into_iter()
                .map(|(key, snapshot)| Notification::Deleted { key, snapshot }),
        );

        if !self.synced {
            self.synced = true;
            info!(kind = K::KIND, objects = self.reader.len(), "Informer cache synced");
            metrics::set_cache_synced(K::KIND, true);
        }
        notifications
    }

    /// Drive the informer from a watcher stream until it ends or `sink` returns `false`.
    ///
    /// Stream errors are logged and skipped; the watcher recovers from them by relisting.
    pub async fn run<S, F>(mut self, stream: S, mut sink: F)
    where
        S: Stream<Item = Result<watcher::Event<K>, watcher::Error>>,
        F: FnMut(Notification) -> bool,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(kind = K::KIND, error = %e, "Watch stream error");
                    continue;
                }
            };

            for notification in self.handle(event) {
                metrics::record_notification(K::KIND, notification.event());
                trace!(kind = K::KIND, key = %notification.key(), event = notification.event(), "Notification");
                if !sink(notification) {
                    debug!(kind = K::KIND, "Notification sink closed, stopping informer");
                    return;
                }
            }
        }
        debug!(kind = K::KIND, "Watch stream ended");
    }
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;
