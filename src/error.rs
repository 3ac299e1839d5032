//! Error types for the Crowd Control client

use crate::transport::TransportError;
use thiserror::Error;

/// Errors surfaced to callers of [`crate::CrowdControl`].
///
/// Opt-out and "not ready yet" are not errors: those calls return quietly.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("collection call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("unable to start identity resolution: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("no transport configured")]
    NoTransport,
}
