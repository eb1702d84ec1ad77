// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource snapshots: the three facts the change extractor needs.
//!
//! Watched objects come in different shapes. Each supported kind implements
//! [`SnapshotSource`] to reduce an object to a [`ResourceSnapshot`] holding the
//! eligibility marker, the fully-qualified name and the load-balancer address. The
//! extractor only ever sees snapshots, so it stays independent of the resource kind.
//!
//! | Kind | Marker | Name | Address |
//! |------|--------|------|---------|
//! | `Service` | marker annotation == marker value | FQDN annotation | `status.loadBalancer.ingress[0].ip` |
//! | `Ingress` | class annotation or `spec.ingressClassName` == marker value | `spec.rules[0].host` | `status.loadBalancer.ingress[0].ip` |

use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::constants::{
    INGRESS_MARKER_ANNOTATION, INGRESS_MARKER_VALUE, SERVICE_FQDN_ANNOTATION,
    SERVICE_MARKER_ANNOTATION, SERVICE_MARKER_VALUE, TTL_ANNOTATION,
};

/// What the extractor knows about one version of a watched object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceSnapshot {
    /// The eligibility marker holds
    pub marker: bool,
    pub fqdn: Option<String>,
    pub address: Option<String>,
    /// Explicit TTL requested through the TTL annotation
    pub ttl: Option<u32>,
}

impl ResourceSnapshot {
    /// A snapshot is eligible when the marker holds and both name and address are present.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.marker && self.fqdn.is_some() && self.address.is_some()
    }
}

/// Annotation keys and values that decide eligibility.
///
/// The exact strings are deployment policy, so they are configurable; the defaults
/// match the conventions of each resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub marker_annotation: String,
    pub marker_value: String,
    /// Annotation carrying the FQDN. Required for services, optional override for ingresses.
    pub fqdn_annotation: Option<String>,
}

impl Markers {
    #[must_use]
    pub fn for_service() -> Self {
        Self {
            marker_annotation: SERVICE_MARKER_ANNOTATION.to_string(),
            marker_value: SERVICE_MARKER_VALUE.to_string(),
            fqdn_annotation: Some(SERVICE_FQDN_ANNOTATION.to_string()),
        }
    }

    #[must_use]
    pub fn for_ingress() -> Self {
        Self {
            marker_annotation: INGRESS_MARKER_ANNOTATION.to_string(),
            marker_value: INGRESS_MARKER_VALUE.to_string(),
            fqdn_annotation: None,
        }
    }

    fn marker_holds(&self, annotations: &BTreeMap<String, String>) -> bool {
        annotations
            .get(&self.marker_annotation)
            .is_some_and(|value| *value == self.marker_value)
    }

    fn annotated_fqdn(&self, annotations: &BTreeMap<String, String>) -> Option<String> {
        self.fqdn_annotation
            .as_ref()
            .and_then(|key| annotations.get(key))
            .and_then(|value| non_empty(Some(value)))
    }
}

/// Kubernetes kinds that can be reduced to a [`ResourceSnapshot`].
pub trait SnapshotSource:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Send + Sync + 'static
{
    /// Kind name used in logs and metrics (e.g., `Service`)
    const KIND: &'static str;

    /// Default eligibility markers for this kind
    fn default_markers() -> Markers;

    /// Reduce this object to the facts the extractor needs.
    fn snapshot(&self, markers: &Markers) -> ResourceSnapshot;
}

impl SnapshotSource for Service {
    const KIND: &'static str = "Service";

    fn default_markers() -> Markers {
        Markers::for_service()
    }

    fn snapshot(&self, markers: &Markers) -> ResourceSnapshot {
        let annotations = self.annotations();

        let address = self
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|ingress| ingress.first())
            .and_then(|ingress| non_empty(ingress.ip.as_ref()));

        ResourceSnapshot {
            marker: markers.marker_holds(annotations),
            fqdn: markers.annotated_fqdn(annotations),
            address,
            ttl: ttl_from(annotations),
        }
    }
}

impl SnapshotSource for Ingress {
    const KIND: &'static str = "Ingress";

    fn default_markers() -> Markers {
        Markers::for_ingress()
    }

    fn snapshot(&self, markers: &Markers) -> ResourceSnapshot {
        let annotations = self.annotations();
        let spec = self.spec.as_ref();

        let class_matches = spec
            .and_then(|spec| spec.ingress_class_name.as_ref())
            .is_some_and(|class| *class == markers.marker_value);

        let host = spec
            .and_then(|spec| spec.rules.as_ref())
            .and_then(|rules| rules.first())
            .and_then(|rule| non_empty(rule.host.as_ref()));

        let address = self
            .status
            .as_ref()
            .and_then(|status| status.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .and_then(|ingress| ingress.first())
            .and_then(|ingress| non_empty(ingress.ip.as_ref()));

        ResourceSnapshot {
            marker: markers.marker_holds(annotations) || class_matches,
            fqdn: markers.annotated_fqdn(annotations).or(host),
            address,
            ttl: ttl_from(annotations),
        }
    }
}

/// Build the `namespace/name` key identifying an object in the work queue.
///
/// Cluster-scoped objects are keyed by name alone.
#[must_use]
pub fn resource_key<K: Resource>(obj: &K) -> String {
    let name = obj.meta().name.clone().unwrap_or_default();
    match obj.meta().namespace.as_deref() {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
        _ => name,
    }
}

fn ttl_from(annotations: &BTreeMap<String, String>) -> Option<u32> {
    annotations
        .get(TTL_ANNOTATION)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|ttl| *ttl > 0)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod snapshot_tests;
