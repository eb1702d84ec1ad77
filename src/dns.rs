// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS value types shared by the extractor, the work queue and the provider adapter.
//!
//! Everything in this module is a plain value: entries and change sets are built fresh
//! for each watch event and never mutated once handed to a worker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ProviderError;

/// DNS record types this controller knows how to publish.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum RecordType {
    #[default]
    A,
    CNAME,
    TXT,
}

impl RecordType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::CNAME => "CNAME",
            RecordType::TXT => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "CNAME" => Ok(RecordType::CNAME),
            "TXT" => Ok(RecordType::TXT),
            other => Err(ProviderError::UnsupportedRecordType {
                record_type: other.to_string(),
            }),
        }
    }
}

/// A single logical DNS record derived from a watched resource.
///
/// Equality is structural. `ttl` is `None` when the resource did not ask for an
/// explicit TTL; the provider adapter substitutes its configured default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DnsEntry {
    pub fqdn: String,
    pub record_type: RecordType,
    pub ttl: Option<u32>,
    pub value: String,
}

impl DnsEntry {
    #[must_use]
    pub fn new(fqdn: impl Into<String>, record_type: RecordType, value: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            record_type,
            ttl: None,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// True for the zero-valued entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for DnsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.fqdn, self.record_type, self.value)
    }
}

/// Four-way DNS diff produced for one resource change.
///
/// `update_old` and `update_new` move in lockstep: both are empty or both are populated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub create: Vec<DnsEntry>,
    pub update_old: Vec<DnsEntry>,
    pub update_new: Vec<DnsEntry>,
    pub delete: Vec<DnsEntry>,
}

impl ChangeSet {
    #[must_use]
    pub fn create(entry: DnsEntry) -> Self {
        Self {
            create: vec![entry],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn delete(entry: DnsEntry) -> Self {
        Self {
            delete: vec![entry],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn update(old: DnsEntry, new: DnsEntry) -> Self {
        Self {
            update_old: vec![old],
            update_new: vec![new],
            ..Self::default()
        }
    }

    /// A change set with nothing in any slot is a no-op and must not be applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }

    /// Entries that must be removed from the zone, in apply order.
    pub fn removals(&self) -> impl Iterator<Item = &DnsEntry> {
        self.delete.iter().chain(self.update_old.iter())
    }

    /// Entries that must be created or overwritten, in apply order.
    pub fn upserts(&self) -> impl Iterator<Item = &DnsEntry> {
        self.create.iter().chain(self.update_new.iter())
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match (
            self.create.is_empty(),
            self.update_new.is_empty(),
            self.delete.is_empty(),
        ) {
            (true, true, true) => "noop",
            (false, true, true) => "create",
            (true, false, true) => "update",
            (true, true, false) => "delete",
            _ => "mixed",
        }
    }
}

/// Queued unit of reconciliation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// `namespace/name` of the watched resource
    pub key: String,
    pub changes: ChangeSet,
}

/// A DNS zone managed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
}

impl Zone {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Provider-side record set: all values of one type under one name in one zone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    /// Relative name within the zone (`@` for the apex)
    pub name: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub a_records: Vec<String>,
    pub cname: Option<String>,
    pub txt: Vec<String>,
}

impl RecordSet {
    /// Values carried by this record set, following the record type.
    #[must_use]
    pub fn targets(&self) -> Vec<String> {
        match self.record_type {
            RecordType::A => self.a_records.clone(),
            RecordType::CNAME => self.cname.iter().cloned().collect(),
            RecordType::TXT => self.txt.iter().take(1).cloned().collect(),
        }
    }
}

#[cfg(test)]
#[path = "dns_tests.rs"]
mod dns_tests;
