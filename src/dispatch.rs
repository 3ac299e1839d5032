//! Outbound request dispatch.
//!
//! Two modes share one [`Transport`]:
//!
//! - [`DispatchGateway::send_sync`] blocks the caller and returns transport
//!   errors.
//! - [`DispatchGateway::send_async`] runs the request on its own thread and
//!   hands back a [`SendHandle`]. Failures on that path are logged and folded
//!   into [`SendOutcome::Failed`]; they never reach the caller as errors.

use crate::transport::{Headers, Transport, TransportError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// User agent sent with every request.
pub const USER_AGENT: &str = "Crowd Control Rust SDK";

const HEADER_USER_AGENT: &str = "User-Agent";
const HEADER_ACCEPT_CHARSET: &str = "Accept-Charset";

/// Result of a non-blocking send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The request completed; carries the response body.
    Delivered(String),
    /// The request failed. Details were logged.
    Failed,
    /// The caller stopped waiting before the request completed.
    TimedOut,
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered(_))
    }
}

/// Handle to a request running in the background.
#[derive(Debug)]
pub struct SendHandle {
    result: Receiver<SendOutcome>,
}

impl SendHandle {
    /// Wait at most `timeout` for the request to finish.
    ///
    /// The request keeps running if the wait times out; its result is then
    /// discarded.
    pub fn wait(&self, timeout: Duration) -> SendOutcome {
        match self.result.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => SendOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => SendOutcome::Failed,
        }
    }

    /// Poll without blocking. `None` while the request is in flight.
    pub fn try_outcome(&self) -> Option<SendOutcome> {
        match self.result.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(SendOutcome::Failed),
        }
    }
}

/// Sends requests for one client, applying its headers and timeout.
pub struct DispatchGateway {
    transport: Arc<dyn Transport>,
    custom_headers: Mutex<HashMap<String, String>>,
    timeout: Duration,
}

impl DispatchGateway {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            custom_headers: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Set a custom header for every later request.
    ///
    /// `User-Agent` and `Accept-Charset` are always overridden.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock_headers().insert(name.into(), value.into());
    }

    /// The custom value stored for `name`.
    pub fn header(&self, name: &str) -> Option<String> {
        self.lock_headers().get(name).cloned()
    }

    /// Headers for a request: custom headers first, reserved ones on top.
    pub fn request_headers(&self, include_custom: bool) -> Headers {
        let mut headers = Headers::new();
        if include_custom {
            for (name, value) in self.lock_headers().iter() {
                if !is_reserved(name) {
                    headers.insert(name.clone(), value.clone());
                }
            }
        }
        headers.insert(HEADER_USER_AGENT.to_string(), USER_AGENT.to_string());
        headers.insert(HEADER_ACCEPT_CHARSET.to_string(), "utf-8".to_string());
        headers
    }

    /// Blocking GET with the custom headers.
    pub fn send_sync(&self, url: &str) -> Result<String, TransportError> {
        let headers = self.request_headers(true);
        self.transport.issue_get(url, &headers, self.timeout)
    }

    /// Non-blocking GET with the custom headers.
    pub fn send_async(&self, url: String) -> SendHandle {
        self.send_async_with(url, true, |_| {})
    }

    /// Non-blocking GET carrying only the reserved headers.
    pub fn send_async_bare(&self, url: String) -> SendHandle {
        self.send_async_with(url, false, |_| {})
    }

    /// Non-blocking GET; `on_done` sees the outcome on the send thread
    /// before it is handed to the [`SendHandle`].
    pub fn send_async_with<F>(&self, url: String, include_custom: bool, on_done: F) -> SendHandle
    where
        F: FnOnce(&SendOutcome) + Send + 'static,
    {
        let headers = self.request_headers(include_custom);
        let (tx, rx) = bounded(1);
        let transport = Arc::clone(&self.transport);
        let timeout = self.timeout;

        let spawned = thread::Builder::new()
            .name("crowd-control-send".to_string())
            .spawn(move || {
                let outcome = match transport.issue_get(&url, &headers, timeout) {
                    Ok(body) => SendOutcome::Delivered(body),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Async send failed");
                        SendOutcome::Failed
                    }
                };
                on_done(&outcome);
                // The handle may already be gone; the result is then dropped.
                let _ = tx.send(outcome);
            });

        if let Err(e) = spawned {
            // The sender went down with the closure, so the handle reads Failed.
            tracing::warn!(error = %e, "Unable to start send thread");
        }
        SendHandle { result: rx }
    }

    fn lock_headers(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.custom_headers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_reserved(name: &str) -> bool {
    name.eq_ignore_ascii_case(HEADER_USER_AGENT) || name.eq_ignore_ascii_case(HEADER_ACCEPT_CHARSET)
}
