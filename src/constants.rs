// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the lbdns controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Annotation Constants
// ============================================================================

/// Annotation that marks a `Service` as backed by an internal load balancer
pub const SERVICE_MARKER_ANNOTATION: &str = "service.beta.kubernetes.io/azure-load-balancer-internal";

/// Value the service marker annotation must carry for the service to be eligible
pub const SERVICE_MARKER_VALUE: &str = "true";

/// Annotation carrying the fully-qualified name to publish for a `Service`
pub const SERVICE_FQDN_ANNOTATION: &str =
    "service.beta.kubernetes.io/azure-load-balancer-privatedns-fqdn";

/// Annotation selecting the ingress controller class of an `Ingress`
pub const INGRESS_MARKER_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// Ingress class that makes an `Ingress` eligible
pub const INGRESS_MARKER_VALUE: &str = "nginx";

/// Optional annotation overriding the record TTL (seconds)
pub const TTL_ANNOTATION: &str = "lbdns.io/ttl";

// ============================================================================
// DNS Constants
// ============================================================================

/// Default TTL for DNS records (5 minutes)
pub const DEFAULT_RECORD_TTL_SECS: u32 = 300;

/// Record-set name used for the zone apex
pub const ZONE_APEX_NAME: &str = "@";

// ============================================================================
// Work Queue Constants
// ============================================================================

/// Maximum number of times a work item is applied before it is dropped
pub const MAX_ATTEMPTS: u32 = 5;

/// Base delay for per-key exponential backoff (5 milliseconds)
pub const ITEM_BACKOFF_BASE_MILLIS: u64 = 5;

/// Maximum delay for per-key exponential backoff (1000 seconds)
pub const ITEM_BACKOFF_MAX_SECS: u64 = 1000;

/// Global token bucket refill rate shared by all keys (requests per second)
pub const BUCKET_QPS: f64 = 10.0;

/// Global token bucket burst size
pub const BUCKET_BURST: u32 = 100;

// ============================================================================
// Controller Constants
// ============================================================================

/// Default number of worker tasks draining the queue
pub const DEFAULT_WORKERS: usize = 2;

/// Default time allowed for the initial list to complete (2 minutes)
pub const DEFAULT_CACHE_SYNC_TIMEOUT_SECS: u64 = 120;

/// Default upper bound on a single apply call (1 minute)
pub const DEFAULT_APPLY_TIMEOUT_SECS: u64 = 60;

/// Default listen address for the metrics endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Azure Constants
// ============================================================================

/// Azure Resource Manager endpoint for the public cloud
pub const AZURE_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";

/// Azure AD authority host
pub const AZURE_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// OAuth2 scope requested for Resource Manager tokens
pub const AZURE_MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// API version of the public DNS resource provider
pub const AZURE_PUBLIC_DNS_API_VERSION: &str = "2018-05-01";

/// API version of the private DNS resource provider
pub const AZURE_PRIVATE_DNS_API_VERSION: &str = "2018-09-01";

/// Tokens are refreshed this long before they expire (5 minutes)
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// HTTP timeout for Azure API requests (30 seconds)
pub const AZURE_HTTP_TIMEOUT_SECS: u64 = 30;

/// Environment variable pointing at the auth file used outside the cluster
pub const AZURE_AUTH_LOCATION_ENV: &str = "AZURE_AUTH_LOCATION";
