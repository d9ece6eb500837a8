//! HTTP client utilities.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with a default deadline that callers may override per request
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a client from configuration
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            default_timeout: config.timeout(),
        })
    }

    /// Deadline applied when a call does not pass its own
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// GET `url` with query `params` and return the body as text
    pub async fn get_text<Q>(
        &self,
        url: &str,
        params: &Q,
        timeout: Option<Duration>,
    ) -> Result<String, SourceError>
    where
        Q: Serialize + ?Sized,
    {
        self.get_text_with_headers(url, params, &[], timeout).await
    }

    /// Like [`get_text`](Self::get_text) with extra request headers
    pub async fn get_text_with_headers<Q>(
        &self,
        url: &str,
        params: &Q,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<String, SourceError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self.send(url, params, headers, timeout).await?;
        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response from {}: {}", url, e)))
    }

    /// GET `url` with query `params` and decode the JSON body
    pub async fn get_json<T, Q>(
        &self,
        url: &str,
        params: &Q,
        timeout: Option<Duration>,
    ) -> Result<T, SourceError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let body = self.get_text(url, params, timeout).await?;
        serde_json::from_str(&body)
            .map_err(|e| SourceError::Parse(format!("Invalid JSON from {}: {}", url, e)))
    }

    async fn send<Q>(
        &self,
        url: &str,
        params: &Q,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<Response, SourceError>
    where
        Q: Serialize + ?Sized,
    {
        let timeout = timeout.unwrap_or(self.default_timeout);
        tracing::debug!(url, timeout_secs = timeout.as_secs(), "GET");

        let mut request = self.client.get(url).query(params).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}
