// src/services/fetcher.rs

//! Page retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{FetchError, Result};
use crate::models::HttpConfig;
use crate::utils::http::create_async_client;

/// Retrieves the raw bytes of a page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// HTTP fetcher with a per-request timeout and bounded retries.
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher from HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            max_attempts: config.max_retries.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) if attempt < self.max_attempts && error.is_retryable() => {
                    log::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        self.max_attempts,
                        url,
                        error
                    );
                    attempt += 1;
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(error) => {
                    log::error!(
                        "Failed to fetch {} after {} attempt(s): {}",
                        url,
                        attempt,
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}
