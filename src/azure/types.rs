// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types of the Azure Resource Manager DNS APIs.
//!
//! Public DNS (`Microsoft.Network/dnsZones`) spells record-set properties with upper-case
//! prefixes (`TTL`, `ARecords`), private DNS (`Microsoft.Network/privateDnsZones`) uses
//! camel case (`ttl`, `aRecords`). Responses are decoded with both spellings; request
//! bodies are written by [`RecordSetBody::for_flavor`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::dns::{RecordSet, RecordType, Zone};
use crate::errors::ProviderError;

/// One page of an ARM list operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArmZone {
    pub name: String,
}

impl From<ArmZone> for Zone {
    fn from(zone: ArmZone) -> Self {
        Zone::new(zone.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArmRecordSet {
    pub name: String,
    /// Full resource type, e.g. `Microsoft.Network/dnszones/A`
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub properties: ArmRecordSetProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmRecordSetProperties {
    #[serde(rename = "TTL", alias = "ttl", default)]
    pub ttl: Option<u32>,
    #[serde(rename = "ARecords", alias = "aRecords", default)]
    pub a_records: Option<Vec<ArmARecord>>,
    #[serde(rename = "CNAMERecord", alias = "cnameRecord", default)]
    pub cname_record: Option<ArmCnameRecord>,
    #[serde(rename = "TXTRecords", alias = "txtRecords", default)]
    pub txt_records: Option<Vec<ArmTxtRecord>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmARecord {
    #[serde(rename = "ipv4Address")]
    pub ipv4_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmCnameRecord {
    pub cname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmTxtRecord {
    #[serde(default)]
    pub value: Vec<String>,
}

impl ArmRecordSet {
    /// The record type from the last segment of the resource type.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedRecordType`] for SOA, NS, MX and friends.
    pub fn record_type(&self) -> Result<RecordType, ProviderError> {
        let short = self
            .resource_type
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_type);
        RecordType::from_str(short)
    }

    /// Convert to the provider-neutral record set.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::UnsupportedRecordType`] when the type cannot be published.
    pub fn into_record_set(self) -> Result<RecordSet, ProviderError> {
        let record_type = self.record_type()?;
        let properties = self.properties;

        Ok(RecordSet {
            name: self.name,
            record_type,
            ttl: properties.ttl.unwrap_or_default(),
            a_records: properties
                .a_records
                .unwrap_or_default()
                .into_iter()
                .map(|record| record.ipv4_address)
                .collect(),
            cname: properties.cname_record.map(|record| record.cname),
            txt: properties
                .txt_records
                .unwrap_or_default()
                .into_iter()
                .flat_map(|record| record.value)
                .collect(),
        })
    }
}

/// Which of the two ARM DNS services a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsFlavor {
    Public,
    Private,
}

/// Request body for a record-set PUT.
pub struct RecordSetBody;

impl RecordSetBody {
    #[must_use]
    pub fn for_flavor(flavor: DnsFlavor, record_set: &RecordSet) -> Value {
        let a_records: Vec<ArmARecord> = record_set
            .a_records
            .iter()
            .map(|ip| ArmARecord {
                ipv4_address: ip.clone(),
            })
            .collect();
        let cname = record_set.cname.as_ref().map(|cname| ArmCnameRecord {
            cname: cname.clone(),
        });
        let txt: Vec<ArmTxtRecord> = record_set
            .txt
            .iter()
            .map(|value| ArmTxtRecord {
                value: vec![value.clone()],
            })
            .collect();

        let properties = match (flavor, record_set.record_type) {
            (DnsFlavor::Public, RecordType::A) => json!({ "TTL": record_set.ttl, "ARecords": a_records }),
            (DnsFlavor::Public, RecordType::CNAME) => json!({ "TTL": record_set.ttl, "CNAMERecord": cname }),
            (DnsFlavor::Public, RecordType::TXT) => json!({ "TTL": record_set.ttl, "TXTRecords": txt }),
            (DnsFlavor::Private, RecordType::A) => json!({ "ttl": record_set.ttl, "aRecords": a_records }),
            (DnsFlavor::Private, RecordType::CNAME) => json!({ "ttl": record_set.ttl, "cnameRecord": cname }),
            (DnsFlavor::Private, RecordType::TXT) => json!({ "ttl": record_set.ttl, "txtRecords": txt }),
        };

        json!({ "properties": properties })
    }
}

/// Successful answer of the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds; some endpoints send it as a string
    #[serde(default)]
    pub expires_in: Value,
}

impl TokenResponse {
    #[must_use]
    pub fn expires_in_secs(&self) -> Option<i64> {
        match &self.expires_in {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
