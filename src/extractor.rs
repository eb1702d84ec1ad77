// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Change extraction: decide which DNS mutation a resource change requires.
//!
//! Every function here is pure. Nothing looks at provider state or zones; zone
//! matching happens later in the provider adapter.
//!
//! | old eligible | new eligible | `(fqdn, address)` | result |
//! |---|---|---|---|
//! | yes | yes | differ | `update_old=[old]`, `update_new=[new]` |
//! | yes | yes | equal | no-op |
//! | no | yes | - | `create=[new]` |
//! | yes | no | - | `delete=[old]` |
//! | no | no | - | no-op |

use crate::dns::{ChangeSet, DnsEntry, RecordType};
use crate::snapshot::ResourceSnapshot;

/// The pair of snapshots a work item carries between enqueue and dequeue.
///
/// `old` is the last state the DNS zone was reconciled against (or `None` if the object
/// was unknown), `new` the latest observed state (or `None` if it is gone).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    pub old: Option<ResourceSnapshot>,
    pub new: Option<ResourceSnapshot>,
}

impl Transition {
    #[must_use]
    pub fn created(new: ResourceSnapshot) -> Self {
        Self {
            old: None,
            new: Some(new),
        }
    }

    #[must_use]
    pub fn updated(old: ResourceSnapshot, new: ResourceSnapshot) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    #[must_use]
    pub fn deleted(old: ResourceSnapshot) -> Self {
        Self {
            old: Some(old),
            new: None,
        }
    }

    /// Merge a later transition for the same key into this one.
    ///
    /// The result starts where `self` started and ends where `newer` ends, so applying
    /// it is equivalent to applying both in order.
    #[must_use]
    pub fn coalesce(self, newer: Transition) -> Transition {
        Transition {
            old: self.old,
            new: newer.new,
        }
    }
}

/// DNS entry for a snapshot, or `None` when the snapshot is not eligible.
#[must_use]
pub fn entry_for(snapshot: &ResourceSnapshot) -> Option<DnsEntry> {
    if !snapshot.marker {
        return None;
    }
    let fqdn = snapshot.fqdn.as_ref()?;
    let address = snapshot.address.as_ref()?;
    Some(DnsEntry::new(fqdn.as_str(), RecordType::A, address.as_str()).with_ttl(snapshot.ttl))
}

/// Changes for an object that appeared.
#[must_use]
pub fn created(new: &ResourceSnapshot) -> ChangeSet {
    entry_for(new).map(ChangeSet::create).unwrap_or_default()
}

/// Changes for an object that disappeared.
#[must_use]
pub fn deleted(old: &ResourceSnapshot) -> ChangeSet {
    entry_for(old).map(ChangeSet::delete).unwrap_or_default()
}

/// Changes for an object that was modified.
///
/// Only the `(fqdn, address)` pair is compared; changes to any other field of an
/// eligible object produce no DNS mutation.
#[must_use]
pub fn updated(old: &ResourceSnapshot, new: &ResourceSnapshot) -> ChangeSet {
    match (entry_for(old), entry_for(new)) {
        (Some(old_entry), Some(new_entry)) => {
            if old_entry.fqdn == new_entry.fqdn && old_entry.value == new_entry.value {
                ChangeSet::default()
            } else {
                ChangeSet::update(old_entry, new_entry)
            }
        }
        (None, Some(new_entry)) => ChangeSet::create(new_entry),
        (Some(old_entry), None) => ChangeSet::delete(old_entry),
        (None, None) => ChangeSet::default(),
    }
}

/// Changes for a (possibly coalesced) transition.
#[must_use]
pub fn extract(transition: &Transition) -> ChangeSet {
    match (&transition.old, &transition.new) {
        (None, Some(new)) => created(new),
        (Some(old), None) => deleted(old),
        (Some(old), Some(new)) => updated(old, new),
        (None, None) => ChangeSet::default(),
    }
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod extractor_tests;
