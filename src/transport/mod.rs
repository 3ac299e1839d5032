//! Transport abstraction for outbound GET requests.
//!
//! The client only ever issues single GET requests and reads back the body.
//! Implementations block the calling thread until the response arrives or
//! the timeout expires; the dispatch layer decides which thread that is.

mod mock;

#[cfg(feature = "http")]
mod http;

pub use mock::{MockTransport, RecordedRequest};

#[cfg(feature = "http")]
pub use http::HttpTransport;

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Request headers, ordered by name.
pub type Headers = BTreeMap<String, String>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or read failure.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No response within the timeout.
    #[error("request timed out")]
    Timeout,

    /// The transport could not be set up.
    #[error("transport setup failed: {0}")]
    Build(String),
}

/// Issues GET requests on behalf of the client.
pub trait Transport: Send + Sync {
    /// Perform a GET and return the response body.
    fn issue_get(
        &self,
        url: &str,
        headers: &Headers,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}
