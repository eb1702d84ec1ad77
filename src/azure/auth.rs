// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure credentials and access tokens.
//!
//! Two credential sources are supported:
//!
//! - **In cluster**: `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET` and
//!   optionally `AZURE_SUBSCRIPTION_ID` from the pod environment
//! - **Out of cluster**: the JSON auth file named by `AZURE_AUTH_LOCATION`, as written by
//!   `az ad sp create-for-rbac --sdk-auth`
//!
//! Tokens come from the client-credentials grant and are cached until shortly before
//! they expire.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;
use url::form_urlencoded;

use super::types::TokenResponse;
use crate::constants::{AZURE_AUTHORITY_HOST, AZURE_MANAGEMENT_SCOPE, TOKEN_REFRESH_MARGIN_SECS};
use crate::errors::{ConfigError, ProviderError};

pub const AZURE_TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const AZURE_CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";
pub const AZURE_SUBSCRIPTION_ID_ENV: &str = "AZURE_SUBSCRIPTION_ID";

/// Service principal used to call the management API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// May be empty for in-cluster credentials; the flag value then applies
    pub subscription_id: String,
    /// Token authority, e.g. `https://login.microsoftonline.com`
    pub authority_host: String,
}

// Keep the secret out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

/// Layout of the SDK auth file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthFile {
    client_id: String,
    client_secret: String,
    tenant_id: String,
    #[serde(default)]
    subscription_id: String,
    #[serde(default)]
    active_directory_endpoint_url: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] naming the first variable that is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Credentials::from_env`] with an injectable variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] naming the first variable that is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingSetting {
                    name: name.to_string(),
                })
        };

        Ok(Self {
            tenant_id: required(AZURE_TENANT_ID_ENV)?,
            client_id: required(AZURE_CLIENT_ID_ENV)?,
            client_secret: required(AZURE_CLIENT_SECRET_ENV)?,
            subscription_id: lookup(AZURE_SUBSCRIPTION_ID_ENV).unwrap_or_default(),
            authority_host: AZURE_AUTHORITY_HOST.to_string(),
        })
    }

    /// Read credentials from an SDK auth file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAuthFile`] when the file is unreadable or malformed.
    pub fn from_auth_file(path: &Path) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidAuthFile {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let file: AuthFile = serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            tenant_id: file.tenant_id,
            client_id: file.client_id,
            client_secret: file.client_secret,
            subscription_id: file.subscription_id,
            authority_host: file
                .active_directory_endpoint_url
                .map_or_else(|| AZURE_AUTHORITY_HOST.to_string(), |url| url.trim_end_matches('/').to_string()),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Fetches and caches bearer tokens for the management API.
pub struct TokenProvider {
    http: reqwest::Client,
    credentials: Credentials,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            scope: AZURE_MANAGEMENT_SCOPE.to_string(),
            cached: Mutex::new(None),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.credentials.authority_host, self.credentials.tenant_id
        )
    }

    /// A valid bearer token, fetching a new one when the cached token is about to expire.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] when the token endpoint rejects the credentials or
    /// cannot be reached.
    pub async fn token(&self) -> Result<String, ProviderError> {
        let mut cached = self.cached.lock().await;
        let refresh_at = Utc::now() + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = cached.as_ref() {
            if token.expires_at > refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn fetch(&self) -> Result<CachedToken, ProviderError> {
        let url = self.token_url();
        debug!(url = %url, client_id = %self.credentials.client_id, "Requesting Azure access token");

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("client_secret", &self.credentials.client_secret)
            .append_pair("scope", &self.scope)
            .finish();

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::Auth {
                reason: format!("token request to {url} failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ProviderError::Auth {
            reason: format!("failed to read token response: {e}"),
        })?;
        if !status.is_success() {
            return Err(ProviderError::Auth {
                reason: format!("token endpoint returned HTTP {status}: {text}"),
            });
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| ProviderError::Auth {
            reason: format!("malformed token response: {e}"),
        })?;
        let lifetime = token.expires_in_secs().unwrap_or(0);

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(lifetime),
        })
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
