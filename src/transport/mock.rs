//! Mock transport for testing.
//!
//! Records every request and lets tests script responses and failures.

use super::{Headers, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Headers,
    pub timeout: Duration,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the client owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    requests: Vec<RecordedRequest>,
    responses: VecDeque<String>,
    fail_next: Option<String>,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a body to be returned by the next request.
    pub fn queue_response(&self, body: impl Into<String>) {
        self.lock().responses.push_back(body.into());
    }

    /// Cause the next request to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }

    /// Sleep this long inside every request.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// All requests issued so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// URLs of all requests issued so far.
    pub fn urls(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.url.clone()).collect()
    }

    /// The last request issued.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.lock().requests.last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for MockTransport {
    fn issue_get(
        &self,
        url: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let delay = {
            let mut inner = self.lock();
            inner.requests.push(RecordedRequest {
                url: url.to_string(),
                headers: headers.clone(),
                timeout,
            });
            inner.delay
        };

        // Sleep without holding the lock so concurrent requests overlap.
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(TransportError::Network(error));
        }
        Ok(inner.responses.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_responds() {
        let transport = MockTransport::new();
        transport.queue_response("{\"ok\":true}");

        let mut headers = Headers::new();
        headers.insert("X-Test".to_string(), "1".to_string());
        let body = transport
            .issue_get("http://example/a", &headers, Duration::from_secs(1))
            .unwrap();

        assert_eq!(body, "{\"ok\":true}");
        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "http://example/a");
        assert_eq!(request.headers.get("X-Test").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_fail_next_applies_once() {
        let transport = MockTransport::new();
        transport.fail_next("connection refused");

        let headers = Headers::new();
        let first = transport.issue_get("http://x/", &headers, Duration::from_secs(1));
        assert!(matches!(first, Err(TransportError::Network(_))));

        let second = transport.issue_get("http://x/", &headers, Duration::from_secs(1));
        assert_eq!(second.unwrap(), "");
        assert_eq!(transport.request_count(), 2);
    }
}
