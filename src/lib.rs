// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # lbdns - Load-balancer DNS publisher for Kubernetes
//!
//! lbdns watches Kubernetes `Service` or `Ingress` objects and keeps Azure DNS (public or
//! private zones) in step with the load-balancer addresses they are assigned.
//!
//! ## Overview
//!
//! ```text
//! watch stream ──► informer ──► work queue ──► workers ──► provider adapter ──► Azure DNS
//!                (snapshots)   (per-key,        (extract       (zone match,
//!                               coalescing)      change set)    record sets)
//! ```
//!
//! ## Modules
//!
//! - [`snapshot`] - Reduce watched objects to marker, name and address
//! - [`extractor`] - Pure change extraction from old/new snapshots
//! - [`workqueue`] - Keyed, rate-limited retry queue
//! - [`informer`] - Watch-stream folding and cache sync tracking
//! - [`controller`] - Worker pool, retry ceiling and shutdown
//! - [`provider`] - Zone matching and record-set mutations over a [`provider::DnsApi`]
//! - [`azure`] - Azure Resource Manager DNS backend
//! - [`config`] - Command line and environment configuration
//!
//! ## Example
//!
//! ```rust
//! use lbdns::dns::{ChangeSet, DnsEntry, RecordType};
//! use lbdns::extractor::{extract, Transition};
//! use lbdns::snapshot::ResourceSnapshot;
//!
//! let snapshot = ResourceSnapshot {
//!     marker: true,
//!     fqdn: Some("web.example.com".to_string()),
//!     address: Some("10.0.0.5".to_string()),
//!     ttl: None,
//! };
//!
//! let changes = extract(&Transition::created(snapshot));
//! assert_eq!(
//!     changes,
//!     ChangeSet::create(DnsEntry::new("web.example.com", RecordType::A, "10.0.0.5"))
//! );
//! ```

pub mod azure;
pub mod config;
pub mod constants;
pub mod controller;
pub mod dns;
pub mod errors;
pub mod extractor;
pub mod informer;
pub mod metrics;
pub mod provider;
pub mod snapshot;
pub mod workqueue;
