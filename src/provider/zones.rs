// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone matching and relative record naming.
//!
//! Names are compared case-insensitively and without a trailing dot. A zone only matches
//! at a label boundary: `example.com` covers `svc.example.com` but not `svcexample.com`.

use std::collections::BTreeMap;

use crate::constants::ZONE_APEX_NAME;

/// Lower-case `name` and strip a trailing root dot.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Index of the zones visible to the provider, used for longest-suffix lookup.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    /// normalized name -> name as reported by the provider
    zones: BTreeMap<String, String>,
}

impl ZoneIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for name in names {
            index.add(name);
        }
        index
    }

    pub fn add(&mut self, name: impl Into<String>) {
        let name = name.into();
        let key = normalize_name(&name);
        if !key.is_empty() {
            self.zones.insert(key, name);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Find the most specific zone containing `fqdn`.
    ///
    /// With zones `example.com` and `sub.example.com`, the name `a.sub.example.com`
    /// resolves to `sub.example.com`.
    #[must_use]
    pub fn find_zone(&self, fqdn: &str) -> Option<&str> {
        let fqdn = normalize_name(fqdn);
        if fqdn.is_empty() {
            return None;
        }

        self.zones
            .iter()
            .filter(|(zone, _)| is_within(&fqdn, zone))
            .max_by_key(|(zone, _)| zone.len())
            .map(|(_, original)| original.as_str())
    }
}

fn is_within(fqdn: &str, zone: &str) -> bool {
    fqdn == zone
        || fqdn
            .strip_suffix(zone)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Name of the record set for `fqdn` relative to `zone`.
///
/// The zone suffix and the dot separating it are removed. An empty remainder means the
/// record sits at the zone apex and is named `@`. Callers must only pass an `fqdn` that
/// [`ZoneIndex::find_zone`] matched to `zone`.
#[must_use]
pub fn record_set_name(zone: &str, fqdn: &str) -> String {
    let trimmed = fqdn.trim().trim_end_matches('.');
    let zone_len = normalize_name(zone).len();

    let relative = trimmed
        .len()
        .checked_sub(zone_len)
        .and_then(|end| trimmed.get(..end))
        .unwrap_or_default()
        .trim_end_matches('.');

    if relative.is_empty() {
        ZONE_APEX_NAME.to_string()
    } else {
        relative.to_string()
    }
}

/// Rebuild the fully qualified name of a record set.
#[must_use]
pub fn format_dns_name(record_name: &str, zone: &str) -> String {
    if record_name == ZONE_APEX_NAME {
        zone.to_string()
    } else {
        format!("{record_name}.{zone}")
    }
}

#[cfg(test)]
#[path = "zones_tests.rs"]
mod zones_tests;
