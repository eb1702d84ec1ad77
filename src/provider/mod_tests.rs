// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the provider adapter.

#[cfg(test)]
mod tests {
    use crate::dns::{ChangeSet, DnsEntry, RecordSet, RecordType, Zone};
    use crate::errors::ProviderError;
    use crate::provider::{AdapterOptions, ApplySummary, DnsApi, ProviderAdapter};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Delete(String, RecordType, String),
        Upsert(String, RecordSet),
    }

    /// Records every mutation; names in `failing` reject upserts and deletes.
    #[derive(Default)]
    struct RecordingApi {
        zones: Vec<String>,
        record_sets: HashMap<String, Vec<RecordSet>>,
        failing: HashSet<String>,
        /// HTTP status returned for names in `failing`
        failure_status: u16,
        zone_list_fails: bool,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingApi {
        fn with_zones(zones: &[&str]) -> Self {
            Self {
                zones: zones.iter().map(ToString::to_string).collect(),
                failure_status: 500,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_for(&self, name: &str) -> Result<(), ProviderError> {
            if self.failing.contains(name) {
                Err(ProviderError::Api {
                    method: "PUT".to_string(),
                    url: format!("https://dns.test/{name}"),
                    status: self.failure_status,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DnsApi for RecordingApi {
        async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
            if self.zone_list_fails {
                return Err(ProviderError::ZoneListFailed {
                    resource_group: "rg".to_string(),
                    source: Box::new(ProviderError::Transport {
                        url: "https://dns.test/zones".to_string(),
                        reason: "unreachable".to_string(),
                    }),
                });
            }
            Ok(self.zones.iter().map(Zone::new).collect())
        }

        async fn list_record_sets(&self, zone: &str) -> Result<Vec<RecordSet>, ProviderError> {
            self.record_sets
                .get(zone)
                .cloned()
                .ok_or_else(|| ProviderError::Transport {
                    url: zone.to_string(),
                    reason: "unreachable".to_string(),
                })
        }

        async fn delete_record_set(
            &self,
            zone: &str,
            record_type: RecordType,
            name: &str,
        ) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push(Call::Delete(
                zone.to_string(),
                record_type,
                name.to_string(),
            ));
            self.fail_for(name)
        }

        async fn upsert_record_set(
            &self,
            zone: &str,
            record_set: &RecordSet,
        ) -> Result<(), ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Upsert(zone.to_string(), record_set.clone()));
            self.fail_for(&record_set.name)
        }
    }

    fn a(fqdn: &str, ip: &str) -> DnsEntry {
        DnsEntry::new(fqdn, RecordType::A, ip)
    }

    fn adapter(api: &Arc<RecordingApi>, options: AdapterOptions) -> ProviderAdapter {
        ProviderAdapter::new(Arc::clone(api) as Arc<dyn DnsApi>, options)
    }

    fn upserted_names(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::Upsert(_, record_set) => Some(record_set.name.clone()),
                Call::Delete(..) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_upserts_relative_name() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        let summary = adapter
            .apply_changes(&ChangeSet::create(a("svc.example.com", "10.0.0.5")))
            .await
            .unwrap();

        assert_eq!(
            summary,
            ApplySummary {
                upserted: 1,
                ..ApplySummary::default()
            }
        );
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        let Call::Upsert(zone, record_set) = &calls[0] else {
            panic!("expected an upsert, got {calls:?}");
        };
        assert_eq!(zone, "example.com");
        assert_eq!(record_set.name, "svc");
        assert_eq!(record_set.record_type, RecordType::A);
        assert_eq!(record_set.ttl, 300);
        assert_eq!(record_set.a_records, vec!["10.0.0.5".to_string()]);
    }

    #[tokio::test]
    async fn test_apex_entry_uses_at_name() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        adapter
            .apply_changes(&ChangeSet::create(a("example.com", "10.0.0.5")))
            .await
            .unwrap();

        assert_eq!(upserted_names(&api.calls()), vec!["@".to_string()]);
    }

    #[tokio::test]
    async fn test_longest_suffix_zone_wins() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com", "sub.example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        adapter
            .apply_changes(&ChangeSet::create(a("a.sub.example.com", "10.0.0.5")))
            .await
            .unwrap();

        let calls = api.calls();
        assert!(matches!(
            &calls[0],
            Call::Upsert(zone, record_set) if zone == "sub.example.com" && record_set.name == "a"
        ));
    }

    #[tokio::test]
    async fn test_unmatched_entry_is_ignored() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        let summary = adapter
            .apply_changes(&ChangeSet::create(a("svc.other.org", "10.0.0.5")))
            .await
            .unwrap();

        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.attempted(), 0);
        assert!(api.calls().is_empty());

        // Second miss for the same name is still ignored, only logged more quietly
        let summary = adapter
            .apply_changes(&ChangeSet::create(a("svc.other.org", "10.0.0.5")))
            .await
            .unwrap();
        assert_eq!(summary.ignored, 1);
    }

    #[tokio::test]
    async fn test_deletes_run_before_upserts() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        let changes = ChangeSet {
            create: vec![a("new.example.com", "10.0.0.7")],
            delete: vec![a("gone.example.com", "10.0.0.8")],
            ..ChangeSet::default()
        };
        adapter.apply_changes(&changes).await.unwrap();

        let calls = api.calls();
        assert_eq!(
            calls[0],
            Call::Delete("example.com".to_string(), RecordType::A, "gone".to_string())
        );
        assert!(matches!(&calls[1], Call::Upsert(_, record_set) if record_set.name == "new"));
    }

    #[tokio::test]
    async fn test_address_update_is_single_upsert() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(&api, AdapterOptions::default());

        let summary = adapter
            .apply_changes(&ChangeSet::update(
                a("svc.example.com", "10.0.0.5"),
                a("svc.example.com", "10.0.0.9"),
            ))
            .await
            .unwrap();

        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.upserted, 1);
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            &calls[0],
            Call::Upsert(_, record_set) if record_set.a_records == vec!["10.0.0.9".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_failed_record_does_not_stop_batch() {
        let api = Arc::new(RecordingApi {
            failing: HashSet::from(["bad".to_string()]),
            ..RecordingApi::with_zones(&["example.com"])
        });
        let adapter = adapter(&api, AdapterOptions::default());

        let changes = ChangeSet {
            create: vec![a("bad.example.com", "10.0.0.1"), a("good.example.com", "10.0.0.2")],
            ..ChangeSet::default()
        };
        let summary = adapter.apply_changes(&changes).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.upserted, 1);
        assert_eq!(upserted_names(&api.calls()), vec!["bad".to_string(), "good".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failure_can_request_retry() {
        let api = Arc::new(RecordingApi {
            failing: HashSet::from(["bad".to_string()]),
            ..RecordingApi::with_zones(&["example.com"])
        });
        let adapter = adapter(
            &api,
            AdapterOptions {
                retry_partial_failures: true,
                ..AdapterOptions::default()
            },
        );

        let changes = ChangeSet {
            create: vec![a("bad.example.com", "10.0.0.1"), a("good.example.com", "10.0.0.2")],
            ..ChangeSet::default()
        };
        let result = adapter.apply_changes(&changes).await;

        assert!(matches!(
            result,
            Err(ProviderError::PartialFailure { failed: 1, total: 2 })
        ));
    }

    #[tokio::test]
    async fn test_rejected_record_does_not_request_retry() {
        let api = Arc::new(RecordingApi {
            failing: HashSet::from(["bad".to_string()]),
            failure_status: 400,
            ..RecordingApi::with_zones(&["example.com"])
        });
        let adapter = adapter(
            &api,
            AdapterOptions {
                retry_partial_failures: true,
                ..AdapterOptions::default()
            },
        );

        let changes = ChangeSet {
            create: vec![a("bad.example.com", "10.0.0.1"), a("good.example.com", "10.0.0.2")],
            ..ChangeSet::default()
        };
        let summary = adapter.apply_changes(&changes).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_transient, 0);
        assert_eq!(summary.upserted, 1);
    }

    #[tokio::test]
    async fn test_zone_list_failure_fails_apply() {
        let api = Arc::new(RecordingApi {
            zone_list_fails: true,
            ..RecordingApi::default()
        });
        let adapter = adapter(&api, AdapterOptions::default());

        let result = adapter
            .apply_changes(&ChangeSet::create(a("svc.example.com", "10.0.0.5")))
            .await;

        assert!(matches!(result, Err(ProviderError::ZoneListFailed { .. })));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let api = Arc::new(RecordingApi::with_zones(&["example.com"]));
        let adapter = adapter(
            &api,
            AdapterOptions {
                dry_run: true,
                ..AdapterOptions::default()
            },
        );

        let changes = ChangeSet {
            create: vec![a("new.example.com", "10.0.0.7")],
            delete: vec![a("gone.example.com", "10.0.0.8")],
            ..ChangeSet::default()
        };
        let summary = adapter.apply_changes(&changes).await.unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.upserted, 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_records_lists_inventory() {
        let api = Arc::new(RecordingApi {
            zones: vec!["example.com".to_string(), "broken.org".to_string()],
            record_sets: HashMap::from([(
                "example.com".to_string(),
                vec![
                    RecordSet {
                        name: "@".to_string(),
                        record_type: RecordType::A,
                        ttl: 300,
                        a_records: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
                        ..RecordSet::default()
                    },
                    RecordSet {
                        name: "www".to_string(),
                        record_type: RecordType::CNAME,
                        ttl: 60,
                        cname: Some("example.com".to_string()),
                        ..RecordSet::default()
                    },
                    RecordSet {
                        name: "empty".to_string(),
                        record_type: RecordType::A,
                        ttl: 60,
                        ..RecordSet::default()
                    },
                ],
            )]),
            ..RecordingApi::default()
        });
        let adapter = adapter(&api, AdapterOptions::default());

        let entries = adapter.records().await.unwrap();

        assert_eq!(
            entries,
            vec![
                a("example.com", "10.0.0.1").with_ttl(Some(300)),
                a("example.com", "10.0.0.2").with_ttl(Some(300)),
                DnsEntry::new("www.example.com", RecordType::CNAME, "example.com")
                    .with_ttl(Some(60)),
            ]
        );
    }
}
