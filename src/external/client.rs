//! Outbound HTTP transport shared by the channel adapters.
//!
//! Every adapter owns one [`HttpTransport`]: a pooled `reqwest::Client` built
//! with the adapter's timeout and optional proxy, plus a fixed retry policy.
//! Retries only cover transport errors. A response that arrived, whatever its
//! status or body, is handed back to the adapter untouched so that a platform
//! rejection is never retried into a success.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ChannelError;

/// Fixed retry count with fixed backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub retries: u32,
    /// Wait before each extra attempt
    pub wait: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, wait: Duration) -> Self {
        Self { retries, wait }
    }

    pub const fn none() -> Self {
        Self {
            retries: 0,
            wait: Duration::ZERO,
        }
    }
}

/// Construction options for an [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub retry: RetryPolicy,
}

impl TransportOptions {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            timeout,
            connect_timeout: Duration::from_secs(10),
            proxy: None,
            retry,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }
}

/// HTTP client with retry and cancellation for one channel adapter
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Builds the underlying client.
    ///
    /// Fails when the proxy URL cannot be parsed or the TLS backend cannot be
    /// initialised.
    pub fn new(options: TransportOptions) -> Result<Self, ChannelError> {
        let mut builder = reqwest::Client::builder()
            // Timeouts
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            // Connection pooling
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .gzip(true)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = options.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            retry: options.retry,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Sends a request, retrying transport errors per the retry policy.
    ///
    /// Returns as soon as any response arrives, regardless of status.
    /// Observes `cancel` both while a request is in flight and while waiting
    /// between attempts.
    pub async fn execute(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, ChannelError> {
        let mut attempt = 0;
        loop {
            // Streaming bodies cannot be cloned and get a single attempt
            let Some(current) = request.try_clone() else {
                return send_once(request, cancel).await;
            };

            match send_once(current, cancel).await {
                Err(ChannelError::Transport(e)) if attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.retry.retries,
                        "Transport error, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
                        _ = tokio::time::sleep(self.retry.wait) => {}
                    }
                }
                outcome => return outcome,
            }
        }
    }

    /// Sends a request and decodes a JSON body from a 2xx response.
    ///
    /// Non-2xx statuses become [`ChannelError::Status`]; bodies that are not
    /// the expected JSON become [`ChannelError::Decode`].
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, ChannelError> {
        let response = self.execute(request, cancel).await?;
        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
            body = response.text() => body?,
        };
        debug!(status = status.as_u16(), body = %body, "Platform response");

        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ChannelError::Decode(e.to_string()))
    }
}

/// Joins a base URL and path and appends form-encoded query parameters
pub fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, ChannelError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params)
        .map_err(|e| ChannelError::Misconfigured(format!("invalid endpoint {raw}: {e}")))
}

async fn send_once(
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<Response, ChannelError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ChannelError::Cancelled),
        outcome = request.send() => Ok(outcome?),
    }
}
