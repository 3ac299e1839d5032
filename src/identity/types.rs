//! Resolved identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of identifier was resolved.
///
/// The wire names must match what the collection servers accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
    /// SHA-1 digest of a platform-stable identifier
    #[serde(rename = "SHA1")]
    HashedDeviceId,
    /// Platform advertising identifier
    #[serde(rename = "GAID")]
    AdvertisingId,
}

impl IdKind {
    /// Name sent in the `ua` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::HashedDeviceId => "SHA1",
            IdKind::AdvertisingId => "GAID",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity published by the resolver.
///
/// Immutable after publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identifier reported to the servers
    pub id: String,
    /// Kind of identifier
    pub kind: IdKind,
    /// User opted out of ad tracking; nothing may be collected or sent
    pub limited_tracking: bool,
    /// The advertising id provider answered
    pub resolver_available: bool,
}

impl Identity {
    /// Identity built from an advertising id.
    pub fn advertising(id: impl Into<String>, limited_tracking: bool) -> Self {
        Self {
            id: id.into(),
            kind: IdKind::AdvertisingId,
            limited_tracking,
            resolver_available: true,
        }
    }

    /// Identity built from a hashed fallback id. Never opted out.
    pub fn hashed(digest: impl Into<String>) -> Self {
        Self {
            id: digest.into(),
            kind: IdKind::HashedDeviceId,
            limited_tracking: false,
            resolver_available: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(IdKind::HashedDeviceId.to_string(), "SHA1");
        assert_eq!(IdKind::AdvertisingId.to_string(), "GAID");
        assert_eq!(
            serde_json::to_string(&IdKind::AdvertisingId).unwrap(),
            "\"GAID\""
        );
    }

    #[test]
    fn test_hashed_identity_never_opted_out() {
        let identity = Identity::hashed("abc123");
        assert_eq!(identity.kind, IdKind::HashedDeviceId);
        assert!(!identity.limited_tracking);
        assert!(!identity.resolver_available);
    }
}
