// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::Stream;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher::{self, Event};
use lbdns::constants::{SERVICE_FQDN_ANNOTATION, SERVICE_MARKER_ANNOTATION};
use lbdns::dns::{RecordSet, RecordType, Zone};
use lbdns::errors::ProviderError;
use lbdns::provider::DnsApi;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

type RecordKey = (String, RecordType, String);

/// In-memory DNS service holding record sets per zone.
#[derive(Default)]
pub struct InMemoryDns {
    zones: Vec<String>,
    records: Mutex<BTreeMap<RecordKey, RecordSet>>,
    deletes: Mutex<usize>,
    upserts: Mutex<usize>,
}

impl InMemoryDns {
    pub fn with_zones(zones: &[&str]) -> Self {
        Self {
            zones: zones.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Record set stored under `(zone, type, name)`.
    pub fn get(&self, zone: &str, record_type: RecordType, name: &str) -> Option<RecordSet> {
        self.records
            .lock()
            .unwrap()
            .get(&(zone.to_string(), record_type, name.to_string()))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn deletes(&self) -> usize {
        *self.deletes.lock().unwrap()
    }

    pub fn upserts(&self) -> usize {
        *self.upserts.lock().unwrap()
    }
}

#[async_trait]
impl DnsApi for InMemoryDns {
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
        Ok(self.zones.iter().map(Zone::new).collect())
    }

    async fn list_record_sets(&self, zone: &str) -> Result<Vec<RecordSet>, ProviderError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((record_zone, _, _), _)| record_zone == zone)
            .map(|(_, record_set)| record_set.clone())
            .collect())
    }

    async fn delete_record_set(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<(), ProviderError> {
        *self.deletes.lock().unwrap() += 1;
        self.records
            .lock()
            .unwrap()
            .remove(&(zone.to_string(), record_type, name.to_string()));
        Ok(())
    }

    async fn upsert_record_set(&self, zone: &str, record_set: &RecordSet) -> Result<(), ProviderError> {
        *self.upserts.lock().unwrap() += 1;
        self.records.lock().unwrap().insert(
            (zone.to_string(), record_set.record_type, record_set.name.clone()),
            record_set.clone(),
        );
        Ok(())
    }
}

/// A `LoadBalancer` service in namespace `apps`.
pub fn service(name: &str, fqdn: &str, ip: &str, marked: bool) -> Service {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": name,
            "namespace": "apps",
            "annotations": {
                SERVICE_MARKER_ANNOTATION: if marked { "true" } else { "false" },
                SERVICE_FQDN_ANNOTATION: fqdn,
            },
        },
        "spec": { "type": "LoadBalancer" },
        "status": { "loadBalancer": { "ingress": [{ "ip": ip }] } }
    }))
    .expect("valid service")
}

/// Hand-fed watch stream: events sent on the returned sender come out of the stream.
pub fn watch_channel() -> (
    mpsc::UnboundedSender<Event<Service>>,
    impl Stream<Item = Result<Event<Service>, watcher::Error>> + Send + 'static,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });
    (tx, stream)
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
