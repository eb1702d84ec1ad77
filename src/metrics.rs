// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the lbdns controller.
//!
//! All metrics share the namespace prefix `lbdns_`.
//!
//! # Metrics Categories
//!
//! - **Watch Metrics** - Notifications received from the informer and cache sync state
//! - **Queue Metrics** - Adds, retries, drops and depth of the work queue
//! - **Reconciliation Metrics** - Outcome and duration of each provider apply
//! - **Record Metrics** - Individual record-set mutations against the DNS API
//!
//! # Example
//!
//! ```rust,no_run
//! use lbdns::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Service", std::time::Duration::from_millis(250));
//! ```

use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all lbdns metrics
const METRICS_NAMESPACE: &str = "lbdns";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Watch Metrics
// ============================================================================

/// Informer notifications by resource type and event
///
/// Labels:
/// - `resource_type`: Kind of watched resource (`Service`, `Ingress`)
/// - `event`: `created`, `updated` or `deleted`
pub static NOTIFICATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_notifications_total"),
        "Total number of informer notifications by resource type and event",
    );
    let counter = CounterVec::new(opts, &["resource_type", "event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Whether the informer cache finished its initial list (1 = synced)
pub static CACHE_SYNCED: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cache_synced"),
        "Whether the informer cache has completed its initial list",
    );
    let gauge = GaugeVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Queue Metrics
// ============================================================================

/// Work queue events by resource type
///
/// Labels:
/// - `resource_type`: Kind of watched resource
/// - `event`: `add`, `retry` or `drop`
pub static QUEUE_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_workqueue_events_total"),
        "Total number of work queue adds, retries and drops",
    );
    let counter = CounterVec::new(opts, &["resource_type", "event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of keys waiting to be processed
pub static QUEUE_DEPTH: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_workqueue_depth"),
        "Number of keys ready to be handed to a worker",
    );
    let gauge = GaugeVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of provider applies by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of watched resource
/// - `status`: Outcome (`success`, `error`, `noop`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of provider applies in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Record Metrics
// ============================================================================

/// Record-set mutations sent to the DNS API
///
/// Labels:
/// - `operation`: `delete` or `upsert`
/// - `record_type`: `A`, `CNAME`, `TXT`
/// - `status`: `success`, `error` or `dry_run`
pub static RECORD_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_operations_total"),
        "Total number of DNS record-set mutations by operation, type and status",
    );
    let counter = CounterVec::new(opts, &["operation", "record_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Entries dropped because no managed zone covers their name
pub static ZONE_MISSES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let counter = Counter::new(
        format!("{METRICS_NAMESPACE}_zone_misses_total"),
        "Total number of DNS entries skipped because no zone matched",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record an informer notification
///
/// # Arguments
/// * `resource_type` - The kind of resource watched
/// * `event` - `created`, `updated` or `deleted`
pub fn record_notification(resource_type: &str, event: &str) {
    NOTIFICATIONS_TOTAL
        .with_label_values(&[resource_type, event])
        .inc();
}

/// Mark the informer cache of `resource_type` as synced or not
pub fn set_cache_synced(resource_type: &str, synced: bool) {
    CACHE_SYNCED
        .with_label_values(&[resource_type])
        .set(if synced { 1.0 } else { 0.0 });
}

/// Record a work queue add and publish the new depth
pub fn record_queue_add(resource_type: &str, depth: usize) {
    QUEUE_EVENTS_TOTAL
        .with_label_values(&[resource_type, "add"])
        .inc();
    set_queue_depth(resource_type, depth);
}

/// Record a rate-limited requeue after a failed apply
pub fn record_queue_retry(resource_type: &str) {
    QUEUE_EVENTS_TOTAL
        .with_label_values(&[resource_type, "retry"])
        .inc();
}

/// Record a key dropped after exhausting its attempts
pub fn record_queue_drop(resource_type: &str) {
    QUEUE_EVENTS_TOTAL
        .with_label_values(&[resource_type, "drop"])
        .inc();
}

#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(resource_type: &str, depth: usize) {
    QUEUE_DEPTH
        .with_label_values(&[resource_type])
        .set(depth as f64);
}

/// Record a successful apply
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the apply
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed apply
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the apply before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a work item whose change set turned out empty
pub fn record_reconciliation_noop(resource_type: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "noop"])
        .inc();
}

/// Record one record-set mutation
///
/// # Arguments
/// * `operation` - `delete` or `upsert`
/// * `record_type` - DNS record type
/// * `status` - `success`, `error` or `dry_run`
pub fn record_record_operation(operation: &str, record_type: &str, status: &str) {
    RECORD_OPERATIONS_TOTAL
        .with_label_values(&[operation, record_type, status])
        .inc();
}

/// Record an entry skipped because no zone matched
pub fn record_zone_miss() {
    ZONE_MISSES_TOTAL.inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
