use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Transport settings shared by every outbound adapter
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Sustained request rate
    pub requests_per_minute: u32,
    /// Requests allowed in a burst above the sustained rate
    pub burst_capacity: u32,
    /// Transient-failure retries; 0 sends every request exactly once
    pub max_retries: u32,
    pub timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_capacity: 10,
            max_retries: 0,
            timeout_seconds: 60,
        }
    }
}

/// Status, headers and body text of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }
}

/// Rate-limited HTTP client with optional transient-failure retries
pub struct RateLimitedHttpClient {
    client: ClientWithMiddleware,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    max_retries: u32,
}

impl std::fmt::Debug for RateLimitedHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedHttpClient")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl RateLimitedHttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self, HttpError> {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_capacity).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        let mut builder = ClientBuilder::new(inner);
        if config.max_retries > 0 {
            let policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
        }

        Ok(Self {
            client: builder.build(),
            rate_limiter,
            max_retries: config.max_retries,
        })
    }

    /// POST a JSON body and collect the full response.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only transport
    /// failures surface as [`HttpError`].
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<HttpResponse, HttpError> {
        let payload = serde_json::to_vec(body)?;

        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            request = request.header("Content-Type", "application/json");
        }

        debug!(url = %url, bytes = payload.len(), "Sending POST request");

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::Transport(format!("failed to read response body: {e}")))?;

        debug!(url = %url, status = status, "Received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
