// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for lbdns.
//!
//! This module provides specialized error types for:
//! - DNS provider operations (zone listing, record-set mutations, credentials)
//! - Controller lifecycle failures (cache sync, watch stream)
//! - Configuration problems detected at startup
//!
//! Per-record provider failures are logged and counted by the adapter and never
//! abort a batch. Only errors returned from a whole apply call reach the work queue's
//! retry machinery.

use thiserror::Error;

/// Errors raised while talking to the DNS management API.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Listing the manageable zones failed
    ///
    /// Without a zone list no entry can be matched, so the whole apply fails. Whether
    /// the work item is retried follows the underlying failure.
    #[error("Failed to list DNS zones in resource group '{resource_group}': {source}")]
    ZoneListFailed {
        /// Resource group that was listed
        resource_group: String,
        /// Underlying failure
        #[source]
        source: Box<ProviderError>,
    },

    /// The management API answered with a non-success status
    #[error("DNS API request {method} {url} failed with HTTP {status}: {message}")]
    Api {
        /// HTTP method of the failed request
        method: String,
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body or error message
        message: String,
    },

    /// The request never produced a response (connection refused, DNS failure, timeout)
    #[error("DNS API request to {url} failed: {reason}")]
    Transport {
        /// Request URL
        url: String,
        /// Reason for the failure
        reason: String,
    },

    /// A response body could not be decoded
    #[error("Failed to decode DNS API response from {url}: {reason}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder error
        reason: String,
    },

    /// The record type cannot be published by this controller
    #[error("unsupported record type '{record_type}'")]
    UnsupportedRecordType {
        /// The offending type as reported by the API or the caller
        record_type: String,
    },

    /// Some record mutations in a batch failed
    ///
    /// Only returned when the adapter is configured to retry partial failures.
    #[error("{failed} of {total} record operations failed")]
    PartialFailure {
        /// Number of failed mutations
        failed: usize,
        /// Number of attempted mutations
        total: usize,
    },

    /// Acquiring an access token failed
    #[error("Azure authentication failed: {reason}")]
    Auth {
        /// Reason reported by the token endpoint
        reason: String,
    },

    /// The apply call did not finish within the configured bound
    #[error("apply did not complete within {timeout_secs}s")]
    Timeout {
        /// Configured bound in seconds
        timeout_secs: u64,
    },
}

impl ProviderError {
    /// True when retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::ZoneListFailed { source, .. } => source.is_transient(),
            ProviderError::UnsupportedRecordType { .. } => false,
            _ => true,
        }
    }
}

/// Errors that stop the controller.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// The initial list never completed
    ///
    /// Fatal at startup: without a synced cache the first diffs would be computed
    /// against an empty view and delete live records.
    #[error("failed to wait for caches to sync: {reason}")]
    CacheSyncFailed {
        /// Why the wait ended (timeout or shutdown)
        reason: String,
    },

    /// A worker task panicked or was cancelled
    #[error("worker task failed: {reason}")]
    WorkerFailed {
        /// Join error text
        reason: String,
    },
}

/// Errors detected while resolving the runtime configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting was not provided by flag, environment or auth file
    #[error("missing required setting '{name}'")]
    MissingSetting {
        /// Flag or environment variable name
        name: String,
    },

    /// The credentials file could not be read or parsed
    #[error("invalid Azure auth file '{path}': {reason}")]
    InvalidAuthFile {
        /// Path that was read
        path: String,
        /// Reason for the failure
        reason: String,
    },

    /// A setting had a value outside its accepted range
    #[error("invalid value for '{name}': {reason}")]
    InvalidValue {
        /// Flag name
        name: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
