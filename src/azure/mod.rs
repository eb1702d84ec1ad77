// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS backend for the provider adapter.
//!
//! Talks to the Azure Resource Manager REST API directly:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list zones | `GET .../resourceGroups/{rg}/providers/Microsoft.Network/{service}` |
//! | list record sets | `GET .../{service}/{zone}/recordsets` (public) or `.../ALL` (private) |
//! | upsert | `PUT .../{service}/{zone}/{type}/{name}` |
//! | delete | `DELETE .../{service}/{zone}/{type}/{name}` |
//!
//! where `{service}` is `dnsZones` for public zones and `privateDnsZones` for private
//! zones. List operations follow `nextLink` until the last page.

pub mod auth;
pub mod types;

pub use auth::{Credentials, TokenProvider};
pub use types::DnsFlavor;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::constants::{
    AZURE_HTTP_TIMEOUT_SECS, AZURE_PRIVATE_DNS_API_VERSION, AZURE_PUBLIC_DNS_API_VERSION,
    AZURE_RESOURCE_MANAGER_ENDPOINT,
};
use crate::dns::{RecordSet, RecordType, Zone};
use crate::errors::ProviderError;
use crate::provider::DnsApi;
use types::{ArmRecordSet, ArmZone, Page, RecordSetBody};

impl DnsFlavor {
    /// Resource provider path segment
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            DnsFlavor::Public => "dnsZones",
            DnsFlavor::Private => "privateDnsZones",
        }
    }

    #[must_use]
    pub fn api_version(self) -> &'static str {
        match self {
            DnsFlavor::Public => AZURE_PUBLIC_DNS_API_VERSION,
            DnsFlavor::Private => AZURE_PRIVATE_DNS_API_VERSION,
        }
    }

    fn list_segment(self) -> &'static str {
        match self {
            DnsFlavor::Public => "recordsets",
            DnsFlavor::Private => "ALL",
        }
    }
}

/// Connection settings for [`AzureDnsClient`].
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub subscription_id: String,
    pub resource_group: String,
    pub flavor: DnsFlavor,
    /// Resource Manager base URL
    pub endpoint: String,
}

impl AzureSettings {
    #[must_use]
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>, flavor: DnsFlavor) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            flavor,
            endpoint: AZURE_RESOURCE_MANAGER_ENDPOINT.to_string(),
        }
    }
}

/// [`DnsApi`] implementation for Azure public and private DNS.
pub struct AzureDnsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    settings: AzureSettings,
}

impl AzureDnsClient {
    /// Build a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(credentials: Credentials, settings: AzureSettings) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(AZURE_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Transport {
                url: settings.endpoint.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_http_client(http, credentials, settings))
    }

    #[must_use]
    pub fn with_http_client(http: reqwest::Client, credentials: Credentials, settings: AzureSettings) -> Self {
        info!(
            subscription_id = %settings.subscription_id,
            resource_group = %settings.resource_group,
            service = settings.flavor.service(),
            "Created Azure DNS client"
        );
        Self {
            tokens: TokenProvider::new(http.clone(), credentials),
            http,
            settings,
        }
    }

    /// Resource Manager URL for `segments` below the configured resource group.
    ///
    /// Every segment is percent-encoded on its own.
    fn arm_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let invalid = |reason: String| ProviderError::Transport {
            url: self.settings.endpoint.clone(),
            reason,
        };

        let mut url = Url::parse(&self.settings.endpoint)
            .map_err(|e| invalid(format!("invalid Resource Manager endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| invalid("Resource Manager endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend([
                "subscriptions",
                self.settings.subscription_id.as_str(),
                "resourceGroups",
                self.settings.resource_group.as_str(),
                "providers",
                "Microsoft.Network",
                self.settings.flavor.service(),
            ])
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", self.settings.flavor.api_version());
        Ok(url)
    }

    fn zones_url(&self) -> Result<Url, ProviderError> {
        self.arm_url(&[])
    }

    fn record_sets_url(&self, zone: &str) -> Result<Url, ProviderError> {
        self.arm_url(&[zone, self.settings.flavor.list_segment()])
    }

    fn record_set_url(&self, zone: &str, record_type: RecordType, name: &str) -> Result<Url, ProviderError> {
        self.arm_url(&[zone, record_type.as_str(), name])
    }

    /// Send one authenticated request and return the status and body.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<(reqwest::StatusCode, String), ProviderError> {
        let token = self.tokens.token().await?;
        debug!(method = %method, url = %url, "Azure DNS API request");

        let mut request = self.http.request(method, url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ProviderError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ProviderError::Transport {
            url: url.to_string(),
            reason: format!("failed to read response body: {e}"),
        })?;
        Ok((status, text))
    }

    async fn expect_success(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<String, ProviderError> {
        let (status, text) = self.request(method.clone(), url, body).await?;
        if !status.is_success() {
            error!(method = %method, url = %url, status = %status, error = %text, "Azure DNS API request failed");
            return Err(ProviderError::Api {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }

    /// GET `url` and every page after it.
    async fn get_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ProviderError> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next.take() {
            let text = self.expect_success(Method::GET, &url, None).await?;
            let decode_error = |reason: String| ProviderError::Decode {
                url: url.to_string(),
                reason,
            };
            let page: Page<T> = serde_json::from_str(&text).map_err(|e| decode_error(e.to_string()))?;
            items.extend(page.value);
            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| decode_error(format!("invalid nextLink '{link}': {e}")))?,
                ),
                None => None,
            };
        }

        Ok(items)
    }
}

#[async_trait]
impl DnsApi for AzureDnsClient {
    async fn list_zones(&self) -> Result<Vec<Zone>, ProviderError> {
        let list_failed = |e: ProviderError| ProviderError::ZoneListFailed {
            resource_group: self.settings.resource_group.clone(),
            source: Box::new(e),
        };
        let url = self.zones_url().map_err(list_failed)?;
        let zones: Vec<ArmZone> = self.get_all(url).await.map_err(list_failed)?;
        debug!(count = zones.len(), "Listed DNS zones");
        Ok(zones.into_iter().map(Zone::from).collect())
    }

    async fn list_record_sets(&self, zone: &str) -> Result<Vec<RecordSet>, ProviderError> {
        let raw: Vec<ArmRecordSet> = self.get_all(self.record_sets_url(zone)?).await?;

        let mut record_sets = Vec::with_capacity(raw.len());
        for record_set in raw {
            let name = record_set.name.clone();
            match record_set.into_record_set() {
                Ok(record_set) => record_sets.push(record_set),
                Err(e) => debug!(zone = %zone, name = %name, error = %e, "Skipping record set"),
            }
        }
        Ok(record_sets)
    }

    async fn delete_record_set(
        &self,
        zone: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<(), ProviderError> {
        let url = self.record_set_url(zone, record_type, name)?;
        let (status, text) = self.request(Method::DELETE, &url, None).await?;

        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(ProviderError::Api {
            method: Method::DELETE.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            message: text,
        })
    }

    async fn upsert_record_set(&self, zone: &str, record_set: &RecordSet) -> Result<(), ProviderError> {
        let url = self.record_set_url(zone, record_set.record_type, &record_set.name)?;
        let body = RecordSetBody::for_flavor(self.settings.flavor, record_set);
        self.expect_success(Method::PUT, &url, Some(&body)).await?;
        Ok(())
    }
}
