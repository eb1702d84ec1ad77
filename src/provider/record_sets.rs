// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Turning resolved DNS entries into record-set mutations.
//!
//! The DNS API works on record sets, not single values: one PUT replaces every value of
//! a `(zone, type, name)` triple. Entries are therefore grouped before they are sent.

use std::fmt;

use crate::dns::{DnsEntry, RecordSet, RecordType};

/// Address of one record set at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub zone: String,
    pub record_type: RecordType,
    /// Relative name (`@` for the apex)
    pub name: String,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in zone {}", self.record_type, self.name, self.zone)
    }
}

/// Mutations for one apply call, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    pub deletes: Vec<RecordRef>,
    pub upserts: Vec<(RecordRef, RecordSet)>,
}

impl MutationPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletes.len() + self.upserts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.upserts.is_empty()
    }
}

/// Build the record set for `values` of `record_type`.
///
/// A records carry every value; CNAME and TXT only hold the first one.
#[must_use]
pub fn new_record_set(name: &str, record_type: RecordType, ttl: u32, values: &[String]) -> RecordSet {
    let mut record_set = RecordSet {
        name: name.to_string(),
        record_type,
        ttl,
        ..RecordSet::default()
    };

    match record_type {
        RecordType::A => record_set.a_records = values.to_vec(),
        RecordType::CNAME => record_set.cname = values.first().cloned(),
        RecordType::TXT => record_set.txt = values.iter().take(1).cloned().collect(),
    }
    record_set
}

/// Group resolved entries into record-set deletes and upserts.
///
/// Upserts for the same record set are merged in first-seen order, taking the TTL of the
/// first entry that sets one. A delete of a record set that is also being upserted is
/// dropped: the upsert replaces its values and deleting first would open a window with
/// no record at all.
#[must_use]
pub fn plan_mutations(
    removals: Vec<(RecordRef, DnsEntry)>,
    upserts: Vec<(RecordRef, DnsEntry)>,
    default_ttl: u32,
) -> MutationPlan {
    let mut groups: Vec<(RecordRef, Vec<DnsEntry>)> = Vec::new();
    for (record, entry) in upserts {
        match groups.iter_mut().find(|(existing, _)| *existing == record) {
            Some((_, entries)) => entries.push(entry),
            None => groups.push((record, vec![entry])),
        }
    }

    let mut deletes: Vec<RecordRef> = Vec::new();
    for (record, _) in removals {
        let replaced = groups.iter().any(|(upserted, _)| *upserted == record);
        if !replaced && !deletes.contains(&record) {
            deletes.push(record);
        }
    }

    let upserts = groups
        .into_iter()
        .map(|(record, entries)| {
            let ttl = entries
                .iter()
                .find_map(|entry| entry.ttl)
                .unwrap_or(default_ttl);
            let mut values: Vec<String> = Vec::with_capacity(entries.len());
            for entry in entries {
                if !values.contains(&entry.value) {
                    values.push(entry.value);
                }
            }
            let record_set = new_record_set(&record.name, record.record_type, ttl, &values);
            (record, record_set)
        })
        .collect();

    MutationPlan { deletes, upserts }
}

#[cfg(test)]
#[path = "record_sets_tests.rs"]
mod record_sets_tests;
