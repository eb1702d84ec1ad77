// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `informer.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{SERVICE_FQDN_ANNOTATION, SERVICE_MARKER_ANNOTATION};
    use crate::extractor::Transition;
    use crate::informer::{has_synced, Informer, Notification};
    use crate::snapshot::{ResourceSnapshot, SnapshotSource};
    use k8s_openapi::api::core::v1::Service;
    use kube::runtime::watcher::Event;
    use serde_json::json;

    fn service(name: &str, fqdn: &str, ip: &str) -> Service {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": name,
                "namespace": "apps",
                "annotations": {
                    SERVICE_MARKER_ANNOTATION: "true",
                    SERVICE_FQDN_ANNOTATION: fqdn,
                },
            },
            "spec": { "type": "LoadBalancer" },
            "status": { "loadBalancer": { "ingress": [{ "ip": ip }] } }
        }))
        .expect("valid service")
    }

    fn snapshot(fqdn: &str, ip: &str) -> ResourceSnapshot {
        ResourceSnapshot {
            marker: true,
            fqdn: Some(fqdn.to_string()),
            address: Some(ip.to_string()),
            ttl: None,
        }
    }

    fn informer() -> Informer<Service> {
        Informer::new(Service::default_markers())
    }

    #[test]
    fn test_apply_new_object_is_created() {
        let mut informer = informer();

        let notifications = informer.handle(Event::Apply(service("web", "web.example.com", "10.0.0.5")));

        assert_eq!(
            notifications,
            vec![Notification::Created {
                key: "apps/web".to_string(),
                snapshot: snapshot("web.example.com", "10.0.0.5"),
            }]
        );
        assert_eq!(informer.len(), 1);
    }

    #[test]
    fn test_apply_known_object_is_updated_with_old_state() {
        let mut informer = informer();
        informer.handle(Event::Apply(service("web", "web.example.com", "10.0.0.5")));

        let notifications = informer.handle(Event::Apply(service("web", "web.example.com", "10.0.0.9")));

        assert_eq!(
            notifications,
            vec![Notification::Updated {
                key: "apps/web".to_string(),
                old: snapshot("web.example.com", "10.0.0.5"),
                new: snapshot("web.example.com", "10.0.0.9"),
            }]
        );
    }

    #[test]
    fn test_unchanged_apply_is_silent() {
        let mut informer = informer();
        informer.handle(Event::Apply(service("web", "web.example.com", "10.0.0.5")));

        assert!(informer
            .handle(Event::Apply(service("web", "web.example.com", "10.0.0.5")))
            .is_empty());
    }

    #[test]
    fn test_delete_uses_cached_state() {
        let mut informer = informer();
        informer.handle(Event::Apply(service("web", "web.example.com", "10.0.0.5")));

        // The final object may already have lost its status
        let notifications = informer.handle(Event::Delete(service("web", "web.example.com", "")));

        assert_eq!(
            notifications,
            vec![Notification::Deleted {
                key: "apps/web".to_string(),
                snapshot: snapshot("web.example.com", "10.0.0.5"),
            }]
        );
        assert!(informer.is_empty());
    }

    #[test]
    fn test_initial_list_marks_synced() {
        let mut informer = informer();
        let store = informer.store();
        assert!(!has_synced(&store));

        assert!(informer.handle(Event::Init).is_empty());
        assert!(informer
            .handle(Event::InitApply(service("web", "web.example.com", "10.0.0.5")))
            .is_empty());
        assert!(!has_synced(&store), "not synced until the list is complete");
        assert!(informer.is_empty(), "listed objects are buffered until the list is complete");

        let notifications = informer.handle(Event::InitDone);

        assert!(has_synced(&store));
        assert_eq!(store.len(), 1);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].event(), "created");
    }

    #[test]
    fn test_relist_diffs_against_cache() {
        let mut informer = informer();
        informer.handle(Event::Init);
        informer.handle(Event::InitApply(service("keep", "keep.example.com", "10.0.0.1")));
        informer.handle(Event::InitApply(service("move", "move.example.com", "10.0.0.2")));
        informer.handle(Event::InitApply(service("gone", "gone.example.com", "10.0.0.3")));
        informer.handle(Event::InitDone);

        // Watch restarted; one object changed and one vanished meanwhile
        informer.handle(Event::Init);
        informer.handle(Event::InitApply(service("keep", "keep.example.com", "10.0.0.1")));
        informer.handle(Event::InitApply(service("move", "move.example.com", "10.0.0.9")));
        let mut notifications = informer.handle(Event::InitDone);
        notifications.sort_by(|a, b| a.key().cmp(b.key()));

        assert_eq!(
            notifications,
            vec![
                Notification::Deleted {
                    key: "apps/gone".to_string(),
                    snapshot: snapshot("gone.example.com", "10.0.0.3"),
                },
                Notification::Updated {
                    key: "apps/move".to_string(),
                    old: snapshot("move.example.com", "10.0.0.2"),
                    new: snapshot("move.example.com", "10.0.0.9"),
                },
            ]
        );
        assert_eq!(informer.len(), 2);
    }

    #[test]
    fn test_relist_before_first_sync_reports_nothing_removed() {
        let mut informer = informer();
        informer.handle(Event::Apply(service("early", "early.example.com", "10.0.0.1")));

        informer.handle(Event::Init);
        informer.handle(Event::InitApply(service("early", "early.example.com", "10.0.0.1")));
        let notifications = informer.handle(Event::InitDone);

        assert!(notifications.is_empty(), "unchanged object must stay silent: {notifications:?}");
        assert_eq!(informer.len(), 1);
    }

    #[test]
    fn test_notification_into_work() {
        let (key, transition) = Notification::Deleted {
            key: "apps/web".to_string(),
            snapshot: snapshot("web.example.com", "10.0.0.5"),
        }
        .into_work();

        assert_eq!(key, "apps/web");
        assert_eq!(transition, Transition::deleted(snapshot("web.example.com", "10.0.0.5")));
    }

    #[tokio::test]
    async fn test_run_forwards_notifications_until_sink_closes() {
        let events = vec![
            Ok(Event::Init),
            Ok(Event::InitApply(service("a", "a.example.com", "10.0.0.1"))),
            Ok(Event::InitDone),
            Ok(Event::Apply(service("b", "b.example.com", "10.0.0.2"))),
            Ok(Event::Apply(service("c", "c.example.com", "10.0.0.3"))),
        ];
        let mut seen = Vec::new();

        informer()
            .run(futures::stream::iter(events), |notification| {
                seen.push(notification.key().to_string());
                seen.len() < 2
            })
            .await;

        assert_eq!(seen, vec!["apps/a".to_string(), "apps/b".to_string()]);
    }
}
