//! Analytics Provider Client
//!
//! Thin GET wrapper over the UnleashNFTs-style analytics API. The
//! `AnalyticsApi` trait is the seam the dispatcher depends on, so tests
//! inject doubles and the HTTP client stays swappable. Classified HTTP
//! errors map to distinct messages; the caller decides how failures feed
//! the partial-failure policy.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CopilotError, Result};

/// Narrow request/response contract the core needs from the analytics
/// provider: call this endpoint with these parameters, get JSON or a
/// typed error back.
#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn fetch(&self, path: &str, params: &[(String, String)]) -> Result<Value>;
}

/// Analytics client configuration
#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl AnalyticsConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("UNLEASH_API_KEY").map_err(|_| {
            CopilotError::Analytics("UNLEASH_API_KEY is not set".into())
        })?;
        let base_url = std::env::var("UNLEASH_BASE_URL")
            .unwrap_or_else(|_| "https://api.unleashnfts.com/api/v2".into());

        Ok(Self {
            base_url,
            api_key,
            timeout_secs: 30,
        })
    }
}

/// Production analytics client
pub struct UnleashClient {
    client: reqwest::Client,
    config: AnalyticsConfig,
}

impl UnleashClient {
    pub fn from_config(config: AnalyticsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(AnalyticsConfig::from_env()?)
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<CopilotError> {
        let message = match status.as_u16() {
            400 => "Bad request: please check the API request parameters.",
            401 => "Unauthorized: check your API key.",
            403 => "Forbidden: insufficient permissions.",
            404 => "Not found: endpoint or resource not found.",
            429 => "Rate limited: too many requests.",
            500 => "Server error: the analytics API is experiencing issues.",
            _ if !status.is_success() => {
                return Some(CopilotError::Analytics(format!(
                    "Analytics API returned {status}"
                )));
            }
            _ => return None,
        };
        Some(CopilotError::Analytics(message.into()))
    }
}

#[async_trait]
impl AnalyticsApi for UnleashClient {
    async fn fetch(&self, path: &str, params: &[(String, String)]) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path);

        tracing::debug!(%path, "fetching analytics endpoint");
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .header("accept", "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CopilotError::Analytics("Analytics request timed out.".into())
                } else {
                    CopilotError::Network(e)
                }
            })?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        Ok(response.json().await?)
    }
}
