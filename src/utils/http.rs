// src/utils/http.rs

//! HTTP client utilities.
//!
//! Everything the pipeline fetches goes through the [`Fetcher`] trait so the
//! worker pool can be driven by a scripted fetcher in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::models::CrawlerConfig;

/// A best-effort GET with no retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, returning the body of a 2xx response.
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::new(create_async_client(config)?))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
