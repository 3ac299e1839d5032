//! HTTP transport backed by `reqwest`.
//!
//! The async client is driven by a private tokio runtime, so callers on plain
//! threads can block on it. The runtime is multi-threaded so that several
//! dispatch threads may block on it at the same time.

use super::{Headers, Transport, TransportError};
use std::time::Duration;

/// Blocking GET transport over HTTP(S).
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new() -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("crowd-control-http")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Build(format!("Failed to create runtime: {e}")))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Build(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, runtime })
    }

    async fn get(
        &self,
        url: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        tracing::debug!(url, "Attempt GET");

        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        tracing::debug!(url, "GET success");
        Ok(body)
    }
}

impl Transport for HttpTransport {
    fn issue_get(
        &self,
        url: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.runtime.block_on(self.get(url, headers, timeout))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}
