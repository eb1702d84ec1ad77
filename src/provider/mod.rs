// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider adapter.
//!
//! Translates provider-neutral [`ChangeSet`]s into record-set mutations against a
//! [`DnsApi`] backend.
//!
//! # Apply Algorithm
//!
//! 1. List the manageable zones (fresh on every call, zones may appear at any time)
//! 2. Resolve every entry to its longest-suffix zone; entries without a zone are dropped
//! 3. Group entries into record sets (see [`record_sets::plan_mutations`])
//! 4. Run all deletes, then all upserts
//!
//! A failing record-set mutation is logged and counted but does not stop the rest of the
//! batch. Whether the batch as a whole then reports success is governed by
//! [`AdapterOptions::retry_partial_failures`].

pub mod record_sets;
pub mod zones;

pub use record_sets::{new_record_set, plan_mutations, MutationPlan, RecordRef};
pub use zones::{format_dns_name, normalize_name, record_set_name, ZoneIndex};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::constants::DEFAULT_RECORD_TTL_SECS;
use crate::dns::{ChangeSet, DnsEntry, RecordSet, RecordType, Zone};
use crate::errors::ProviderError;
use crate::metrics;

/// Record-set level operations of a DNS management API.
///
/// Implementations must be safe to share between workers.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// Every zone the credentials may manage.
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError>;

    /// Every record set of a supported type in `zone`.
    async fn list_record_sets(&self, zone: &str) -> Result<Vec<RecordSet>, ProviderError>;

    /// Remove a record set. Removing a record set that does not exist succeeds.
    async fn delete_record_set(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<(), ProviderError>;

    /// Create or replace a record set.
    async fn upsert_record_set(&self, zone: &str, record_set: &RecordSet)
        -> Result<(), ProviderError>;
}

/// Behaviour switches of [`ProviderAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// TTL for entries without an explicit one
    pub default_ttl: u32,
    /// Log mutations instead of sending them
    pub dry_run: bool,
    /// Fail the apply when a record-set mutation failed transiently, so the work item is
    /// retried
    pub retry_partial_failures: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_RECORD_TTL_SECS,
            dry_run: false,
            retry_partial_failures: false,
        }
    }
}

/// Outcome of one apply call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub deleted: usize,
    pub upserted: usize,
    pub failed: usize,
    /// Failures that may succeed on another attempt, included in `failed`
    pub failed_transient: usize,
    /// Entries dropped because no zone matched
    pub ignored: usize,
}

impl ApplySummary {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.deleted + self.upserted + self.failed
    }

    fn record_failure(&mut self, error: &ProviderError) {
        self.failed += 1;
        if error.is_transient() {
            self.failed_transient += 1;
        }
    }
}

/// Applies change sets through a [`DnsApi`].
pub struct ProviderAdapter {
    api: Arc<dyn DnsApi>,
    options: AdapterOptions,
    /// Names already reported as having no zone
    ignored: Mutex<HashSet<String>>,
}

impl ProviderAdapter {
    pub fn new(api: Arc<dyn DnsApi>, options: AdapterOptions) -> Self {
        Self {
            api,
            options,
            ignored: Mutex::new(HashSet::new()),
        }
    }

    /// Apply `changes` to the zones managed by the backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the zone list cannot be fetched, or when
    /// [`AdapterOptions::retry_partial_failures`] is set and a mutation failed with a
    /// transient error.
    pub async fn apply_changes(&self, changes: &ChangeSet) -> Result<ApplySummary, ProviderError> {
        let zones = self.api.list_zones().await?;
        let index = ZoneIndex::new(zones.into_iter().map(|zone| zone.name));
        debug!(zones = index.len(), kind = changes.kind(), "Applying change set");

        let mut summary = ApplySummary::default();
        let removals = self.resolve(&index, changes.removals(), &mut summary);
        let upserts = self.resolve(&index, changes.upserts(), &mut summary);
        let plan = plan_mutations(removals, upserts, self.options.default_ttl);

        for record in &plan.deletes {
            self.delete(record, &mut summary).await;
        }
        for (record, record_set) in &plan.upserts {
            self.upsert(record, record_set, &mut summary).await;
        }

        if summary.failed > 0 {
            warn!(
                failed = summary.failed,
                transient = summary.failed_transient,
                total = summary.attempted(),
                "Some record operations failed"
            );
            if self.options.retry_partial_failures && summary.failed_transient > 0 {
                return Err(ProviderError::PartialFailure {
                    failed: summary.failed,
                    total: summary.attempted(),
                });
            }
        }

        Ok(summary)
    }

    fn resolve<'a>(
        &self,
        index: &ZoneIndex,
        entries: impl Iterator<Item = &'a DnsEntry>,
        summary: &mut ApplySummary,
    ) -> Vec<(RecordRef, DnsEntry)> {
        let mut resolved = Vec::new();
        for entry in entries {
            match index.find_zone(&entry.fqdn) {
                Some(zone) => {
                    let record = RecordRef {
                        zone: zone.to_string(),
                        record_type: entry.record_type,
                        name: record_set_name(zone, &entry.fqdn),
                    };
                    resolved.push((record, entry.clone()));
                }
                None => {
                    summary.ignored += 1;
                    metrics::record_zone_miss();
                    self.report_ignored(&entry.fqdn);
                }
            }
        }
        resolved
    }

    fn report_ignored(&self, fqdn: &str) {
        let first_time = self
            .ignored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_name(fqdn));
        if first_time {
            info!(fqdn = %fqdn, "No matching zone for DNS name, ignoring it");
        } else {
            debug!(fqdn = %fqdn, "No matching zone for DNS name");
        }
    }

    async fn delete(&self, record: &RecordRef, summary: &mut ApplySummary) {
        let record_type = record.record_type.as_str();

        if self.options.dry_run {
            info!(record = %record, "Would delete record set");
            metrics::record_record_operation("delete", record_type, "dry_run");
            summary.deleted += 1;
            return;
        }

        info!(record = %record, "Deleting record set");
        match self
            .api
            .delete_record_set(&record.zone, record.record_type, &record.name)
            .await
        {
            Ok(()) => {
                metrics::record_record_operation("delete", record_type, "success");
                summary.deleted += 1;
            }
            Err(e) => {
                error!(record = %record, error = %e, "Failed to delete record set");
                metrics::record_record_operation("delete", record_type, "error");
                summary.record_failure(&e);
            }
        }
    }

    async fn upsert(&self, record: &RecordRef, record_set: &RecordSet, summary: &mut ApplySummary) {
        let record_type = record.record_type.as_str();
        let targets = record_set.targets();

        if self.options.dry_run {
            info!(record = %record, targets = ?targets, ttl = record_set.ttl, "Would update record set");
            metrics::record_record_operation("upsert", record_type, "dry_run");
            summary.upserted += 1;
            return;
        }

        info!(record = %record, targets = ?targets, ttl = record_set.ttl, "Updating record set");
        match self.api.upsert_record_set(&record.zone, record_set).await {
            Ok(()) => {
                metrics::record_record_operation("upsert", record_type, "success");
                summary.upserted += 1;
            }
            Err(e) => {
                error!(record = %record, error = %e, "Failed to update record set");
                metrics::record_record_operation("upsert", record_type, "error");
                summary.record_failure(&e);
            }
        }
    }

    /// Current inventory of supported records across all zones.
    ///
    /// A zone whose record sets cannot be listed is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the zone list cannot be fetched.
    pub async fn records(&self) -> Result<Vec<DnsEntry>, ProviderError> {
        let zones = self.api.list_zones().await?;
        let mut entries = Vec::new();

        for zone in zones {
            let record_sets = match self.api.list_record_sets(&zone.name).await {
                Ok(record_sets) => record_sets,
                Err(e) => {
                    error!(zone = %zone.name, error = %e, "Failed to list record sets");
                    continue;
                }
            };

            for record_set in record_sets {
                let fqdn = format_dns_name(&record_set.name, &zone.name);
                let targets = record_set.targets();
                if targets.is_empty() {
                    error!(fqdn = %fqdn, record_type = %record_set.record_type, "Record set has no targets, skipping it");
                    continue;
                }
                for target in targets {
                    entries.push(
                        DnsEntry::new(fqdn.clone(), record_set.record_type, target)
                            .with_ttl(Some(record_set.ttl)),
                    );
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
