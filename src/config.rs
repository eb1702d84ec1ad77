// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration.
//!
//! Every flag can also be set through an `LBDNS_*` environment variable. Azure
//! credentials are not flags: they come from the environment (in cluster) or from the
//! auth file named by `AZURE_AUTH_LOCATION`, see [`crate::azure::auth`].

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::azure::{AzureSettings, Credentials, DnsFlavor};
use crate::constants::{
    AZURE_AUTH_LOCATION_ENV, DEFAULT_APPLY_TIMEOUT_SECS, DEFAULT_CACHE_SYNC_TIMEOUT_SECS,
    DEFAULT_METRICS_ADDR, DEFAULT_RECORD_TTL_SECS, DEFAULT_WORKERS, MAX_ATTEMPTS,
};
use crate::controller::ControllerConfig;
use crate::errors::ConfigError;
use crate::provider::AdapterOptions;
use crate::snapshot::Markers;
use crate::workqueue::RateLimiterConfig;

/// Kind of Kubernetes resource to watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    Service,
    Ingress,
}

impl Source {
    #[must_use]
    pub fn default_markers(self) -> Markers {
        match self {
            Source::Service => Markers::for_service(),
            Source::Ingress => Markers::for_ingress(),
        }
    }
}

/// Publish load-balancer addresses of Kubernetes services or ingresses to Azure DNS.
#[derive(Debug, Clone, Parser)]
#[command(name = "lbdns", version, about)]
pub struct Cli {
    /// Azure resource group holding the DNS zones
    #[arg(long, env = "LBDNS_RESOURCE_GROUP")]
    pub resource_group: String,

    /// Manage Azure private DNS zones instead of public zones
    #[arg(long, env = "LBDNS_PRIVATE_ZONES")]
    pub private_zones: bool,

    /// Read Azure credentials from the pod environment instead of the auth file
    #[arg(long, env = "LBDNS_IN_CLUSTER")]
    pub in_cluster: bool,

    /// Resource kind to watch
    #[arg(long, value_enum, default_value = "service", env = "LBDNS_SOURCE")]
    pub source: Source,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "LBDNS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Azure subscription; overrides the one from the credentials
    #[arg(long, env = "LBDNS_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Number of concurrent reconcile workers
    #[arg(long, default_value_t = DEFAULT_WORKERS, env = "LBDNS_WORKERS")]
    pub workers: usize,

    /// TTL in seconds for records without an explicit TTL annotation
    #[arg(long, default_value_t = DEFAULT_RECORD_TTL_SECS, env = "LBDNS_DEFAULT_TTL")]
    pub default_ttl: u32,

    /// Log record changes without sending them to Azure
    #[arg(long, env = "LBDNS_DRY_RUN")]
    pub dry_run: bool,

    /// Retry a change set when any of its record operations failed
    #[arg(long, env = "LBDNS_RETRY_PARTIAL_FAILURES")]
    pub retry_partial_failures: bool,

    /// Seconds to wait for the initial resource list before giving up
    #[arg(long, default_value_t = DEFAULT_CACHE_SYNC_TIMEOUT_SECS, env = "LBDNS_CACHE_SYNC_TIMEOUT_SECS")]
    pub cache_sync_timeout_secs: u64,

    /// Upper bound in seconds for applying one change set
    #[arg(long, default_value_t = DEFAULT_APPLY_TIMEOUT_SECS, env = "LBDNS_APPLY_TIMEOUT_SECS")]
    pub apply_timeout_secs: u64,

    /// Listen address of the metrics and health endpoint
    #[arg(long, default_value = DEFAULT_METRICS_ADDR, env = "LBDNS_METRICS_ADDR")]
    pub metrics_addr: SocketAddr,

    /// Annotation that marks a resource as eligible
    #[arg(long, env = "LBDNS_MARKER_ANNOTATION")]
    pub marker_annotation: Option<String>,

    /// Value the marker annotation (or ingress class) must have
    #[arg(long, env = "LBDNS_MARKER_VALUE")]
    pub marker_value: Option<String>,

    /// Annotation carrying the DNS name
    #[arg(long, env = "LBDNS_FQDN_ANNOTATION")]
    pub fqdn_annotation: Option<String>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub namespace: Option<String>,
    pub markers: Markers,
    pub credentials: Credentials,
    pub azure: AzureSettings,
    pub adapter: AdapterOptions,
    pub controller: ControllerConfig,
    pub metrics_addr: SocketAddr,
}

impl Cli {
    /// Resolve flags and credentials into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error when a setting is out of range, credentials are missing, or no
    /// subscription id is available.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let credentials = if self.in_cluster {
            Credentials::from_env()?
        } else {
            let path = std::env::var(AZURE_AUTH_LOCATION_ENV).map_err(|_| ConfigError::MissingSetting {
                name: AZURE_AUTH_LOCATION_ENV.to_string(),
            })?;
            Credentials::from_auth_file(&PathBuf::from(path))?
        };
        self.resolve_with(credentials)
    }

    /// Resolve against already loaded credentials.
    ///
    /// # Errors
    ///
    /// See [`Cli::resolve`].
    pub fn resolve_with(self, credentials: Credentials) -> Result<Config, ConfigError> {
        if self.resource_group.trim().is_empty() {
            return Err(ConfigError::MissingSetting {
                name: "resource-group".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                name: "workers".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.default_ttl == 0 {
            return Err(ConfigError::InvalidValue {
                name: "default-ttl".to_string(),
                reason: "TTL must be positive".to_string(),
            });
        }

        let subscription_id = self
            .subscription_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| credentials.subscription_id.clone());
        if subscription_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting {
                name: "subscription-id".to_string(),
            });
        }

        let flavor = if self.private_zones {
            DnsFlavor::Private
        } else {
            DnsFlavor::Public
        };

        let mut markers = self.source.default_markers();
        if let Some(annotation) = self.marker_annotation {
            markers.marker_annotation = annotation;
        }
        if let Some(value) = self.marker_value {
            markers.marker_value = value;
        }
        if let Some(annotation) = self.fqdn_annotation {
            markers.fqdn_annotation = Some(annotation);
        }

        Ok(Config {
            source: self.source,
            namespace: self.namespace.filter(|ns| !ns.trim().is_empty()),
            markers,
            credentials,
            azure: AzureSettings::new(subscription_id, self.resource_group, flavor),
            adapter: AdapterOptions {
                default_ttl: self.default_ttl,
                dry_run: self.dry_run,
                retry_partial_failures: self.retry_partial_failures,
            },
            controller: ControllerConfig {
                workers: self.workers,
                cache_sync_timeout: Duration::from_secs(self.cache_sync_timeout_secs),
                apply_timeout: Duration::from_secs(self.apply_timeout_secs),
                max_attempts: MAX_ATTEMPTS,
                rate_limiter: RateLimiterConfig::default(),
            },
            metrics_addr: self.metrics_addr,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
