// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `snapshot.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{SERVICE_FQDN_ANNOTATION, SERVICE_MARKER_ANNOTATION, TTL_ANNOTATION};
    use crate::snapshot::{resource_key, Markers, ResourceSnapshot, SnapshotSource};
    use k8s_openapi::api::core::v1::Service;
    use k8s_openapi::api::networking::v1::Ingress;
    use serde_json::json;

    fn service(annotations: serde_json::Value, ip: Option<&str>) -> Service {
        let ingress = ip.map_or_else(|| json!([]), |ip| json!([{ "ip": ip }]));
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": "web",
                "namespace": "apps",
                "annotations": annotations,
            },
            "spec": { "type": "LoadBalancer" },
            "status": { "loadBalancer": { "ingress": ingress } }
        }))
        .expect("valid service")
    }

    fn ingress(annotations: serde_json::Value, class: Option<&str>, host: Option<&str>, ip: Option<&str>) -> Ingress {
        let rules = host.map_or_else(|| json!([]), |host| json!([{ "host": host }]));
        let lb = ip.map_or_else(|| json!([]), |ip| json!([{ "ip": ip }]));
        serde_json::from_value(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": "site",
                "namespace": "web",
                "annotations": annotations,
            },
            "spec": { "ingressClassName": class, "rules": rules },
            "status": { "loadBalancer": { "ingress": lb } }
        }))
        .expect("valid ingress")
    }

    #[test]
    fn test_service_snapshot_eligible() {
        let svc = service(
            json!({
                SERVICE_MARKER_ANNOTATION: "true",
                SERVICE_FQDN_ANNOTATION: "svc.example.com",
            }),
            Some("10.0.0.5"),
        );

        let snapshot = svc.snapshot(&Service::default_markers());

        assert_eq!(
            snapshot,
            ResourceSnapshot {
                marker: true,
                fqdn: Some("svc.example.com".to_string()),
                address: Some("10.0.0.5".to_string()),
                ttl: None,
            }
        );
        assert!(snapshot.is_eligible());
    }

    #[test]
    fn test_service_marker_false_is_ineligible() {
        let svc = service(
            json!({
                SERVICE_MARKER_ANNOTATION: "false",
                SERVICE_FQDN_ANNOTATION: "svc.example.com",
            }),
            Some("10.0.0.5"),
        );

        let snapshot = svc.snapshot(&Service::default_markers());
        assert!(!snapshot.marker);
        assert!(!snapshot.is_eligible());
    }

    #[test]
    fn test_service_without_address_is_ineligible() {
        let svc = service(
            json!({
                SERVICE_MARKER_ANNOTATION: "true",
                SERVICE_FQDN_ANNOTATION: "svc.example.com",
            }),
            None,
        );

        let snapshot = svc.snapshot(&Service::default_markers());
        assert_eq!(snapshot.address, None);
        assert!(!snapshot.is_eligible());
    }

    #[test]
    fn test_service_empty_fqdn_is_absent() {
        let svc = service(
            json!({
                SERVICE_MARKER_ANNOTATION: "true",
                SERVICE_FQDN_ANNOTATION: "  ",
            }),
            Some("10.0.0.5"),
        );

        let snapshot = svc.snapshot(&Service::default_markers());
        assert_eq!(snapshot.fqdn, None);
        assert!(!snapshot.is_eligible());
    }

    #[test]
    fn test_service_ttl_annotation() {
        let svc = service(
            json!({
                SERVICE_MARKER_ANNOTATION: "true",
                SERVICE_FQDN_ANNOTATION: "svc.example.com",
                TTL_ANNOTATION: "60",
            }),
            Some("10.0.0.5"),
        );
        assert_eq!(svc.snapshot(&Service::default_markers()).ttl, Some(60));

        let bad = service(json!({ TTL_ANNOTATION: "soon" }), None);
        assert_eq!(bad.snapshot(&Service::default_markers()).ttl, None);
    }

    #[test]
    fn test_service_custom_markers() {
        let markers = Markers {
            marker_annotation: "dns.example.io/publish".to_string(),
            marker_value: "yes".to_string(),
            fqdn_annotation: Some("dns.example.io/name".to_string()),
        };
        let svc = service(
            json!({
                "dns.example.io/publish": "yes",
                "dns.example.io/name": "custom.example.com",
            }),
            Some("10.1.1.1"),
        );

        let snapshot = svc.snapshot(&markers);
        assert!(snapshot.is_eligible());
        assert_eq!(snapshot.fqdn.as_deref(), Some("custom.example.com"));
    }

    #[test]
    fn test_ingress_snapshot_from_annotation_class() {
        let ing = ingress(
            json!({ "kubernetes.io/ingress.class": "nginx" }),
            None,
            Some("site.example.com"),
            Some("20.0.0.1"),
        );

        let snapshot = ing.snapshot(&Ingress::default_markers());
        assert!(snapshot.is_eligible());
        assert_eq!(snapshot.fqdn.as_deref(), Some("site.example.com"));
        assert_eq!(snapshot.address.as_deref(), Some("20.0.0.1"));
    }

    #[test]
    fn test_ingress_snapshot_from_class_name() {
        let ing = ingress(json!({}), Some("nginx"), Some("site.example.com"), Some("20.0.0.1"));

        assert!(ing.snapshot(&Ingress::default_markers()).is_eligible());
    }

    #[test]
    fn test_ingress_other_class_is_ineligible() {
        let ing = ingress(json!({}), Some("traefik"), Some("site.example.com"), Some("20.0.0.1"));

        assert!(!ing.snapshot(&Ingress::default_markers()).is_eligible());
    }

    #[test]
    fn test_ingress_without_rules_is_ineligible() {
        let ing = ingress(json!({}), Some("nginx"), None, Some("20.0.0.1"));

        let snapshot = ing.snapshot(&Ingress::default_markers());
        assert_eq!(snapshot.fqdn, None);
        assert!(!snapshot.is_eligible());
    }

    #[test]
    fn test_resource_key_namespaced() {
        let svc = service(json!({}), None);
        assert_eq!(resource_key(&svc), "apps/web");
    }

    #[test]
    fn test_resource_key_without_namespace() {
        let mut svc = service(json!({}), None);
        svc.metadata.namespace = None;
        assert_eq!(resource_key(&svc), "web");
    }
}
