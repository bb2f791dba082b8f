//! Upstream claim source: a single authenticated GET returning a JSON array.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::claims::model::Claim;
use crate::config::NotifierConfig;
use crate::error::FetchError;

/// Header carrying the upstream API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Anything that can produce the batch of claims for one run.
#[async_trait]
pub trait ClaimSource: Send + Sync {
    async fn fetch_claims(&self) -> Result<Vec<Claim>, FetchError>;
}

/// HTTP claim source backed by reqwest.
pub struct HttpClaimSource {
    url: String,
    api_key: SecretString,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpClaimSource {
    pub fn new(url: String, api_key: SecretString, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            url,
            api_key,
            timeout,
            client,
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, FetchError> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.request_timeout,
        )
    }

    fn request_error(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: self.url.clone(),
                timeout: self.timeout,
            }
        } else {
            FetchError::Request {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ClaimSource for HttpClaimSource {
    async fn fetch_claims(&self) -> Result<Vec<Claim>, FetchError> {
        debug!(url = %self.url, "Fetching claims");

        let resp = self
            .client
            .get(&self.url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.request_error(e))?;
        let claims: Vec<Claim> =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        info!(count = claims.len(), "Fetched claims");
        Ok(claims)
    }
}
