//! Transparency module for the Crowd Control client.
//!
//! This module tracks what the client has collected and sent, so a host
//! application can show users exactly what happened on their behalf.

pub mod log;

// Re-export commonly used types
pub use log::{TransparencyLog, TransparencyStats};
