use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::models::{SearchRequest, SearchResponse};

pub const DEVICE_ID_HEADER: &str = "X-Device-ID";

/// Typed access to the search API.
///
/// Implementations are expected to fold transport and protocol failures into a
/// failed `SearchResponse`/`false`. An `Err` is reserved for defects, and
/// probes convert it into a failed result just the same.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn invoke(
        &self,
        strategy: &str,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<SearchResponse>;

    async fn health_check(&self, timeout: Duration) -> Result<bool>;
}

/// reqwest-backed client. One instance is built at startup and shared by
/// every probe in the run.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lookout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, strategy: &str) -> String {
        format!("{}/api/search/{}", self.base_url, strategy)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

#[async_trait]
impl SearchApi for HttpSearchClient {
    async fn invoke(
        &self,
        strategy: &str,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<SearchResponse> {
        let url = self.search_url(strategy);
        debug!(
            method = "POST",
            url = %url,
            body = %serde_json::to_string(request).unwrap_or_default(),
            "search request"
        );

        let mut builder = self.client.post(&url).timeout(timeout).json(request);
        if let Some(device_id) = &request.device_id {
            builder = builder.header(DEVICE_ID_HEADER, device_id);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = describe_transport_error(&e, timeout);
                warn!(url = %url, error = %message, "search request failed");
                return Ok(SearchResponse::failure(strategy, message));
            }
        };

        let status = response.status();
        debug!(status = %status, url = %url, "search response");

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let message = describe_transport_error(&e, timeout);
                warn!(url = %url, error = %message, "failed to read search response body");
                return Ok(SearchResponse::failure(strategy, message));
            }
        };

        if !status.is_success() {
            let message = describe_status_error(status, &body);
            warn!(
                url = %url,
                status = %status,
                error = %message,
                "search API returned error status"
            );
            return Ok(SearchResponse::failure(strategy, message));
        }

        match serde_json::from_str::<SearchResponse>(&body) {
            Ok(decoded) => Ok(decoded.normalized()),
            Err(e) => {
                warn!(url = %url, error = %e, "malformed search response body");
                Ok(SearchResponse::failure(
                    strategy,
                    format!("malformed response body: {e}"),
                ))
            }
        }
    }

    async fn health_check(&self, timeout: Duration) -> Result<bool> {
        let url = self.health_url();
        debug!(method = "GET", url = %url, "health request");

        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                let status = response.status();
                debug!(status = %status, url = %url, "health response");
                Ok(status.is_success())
            }
            Err(e) => {
                let message = describe_transport_error(&e, timeout);
                warn!(url = %url, error = %message, "health check failed");
                Ok(false)
            }
        }
    }
}

fn describe_transport_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("request timed out after {}ms", timeout.as_millis())
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        format!("request failed: {error}")
    }
}

/// Prefer the server's own `error`/`message` field over the bare status line.
fn describe_status_error(status: StatusCode, body: &str) -> String {
    let server_message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .or_else(|| value.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    match server_message {
        Some(message) => format!("HTTP {}: {}", status.as_u16(), message),
        None => format!("HTTP {}", status),
    }
}
