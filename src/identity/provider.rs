//! Capabilities the resolver depends on.
//!
//! The advertising id and its opt-out flag come from the platform, which the
//! client only sees through [`IdentityProvider`]. When that fails, the
//! fallback identifier is hashed with a [`FallbackHasher`].

use sha1::{Digest, Sha1};
use thiserror::Error;

/// Advertising identifier reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingInfo {
    pub id: String,
    pub limited_tracking: bool,
}

/// Why the provider could not answer.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("advertising id service unavailable")]
    Unavailable,

    #[error("advertising id lookup failed: {0}")]
    Failed(String),
}

/// Source of the platform advertising identifier.
pub trait IdentityProvider: Send + Sync {
    /// Look up the advertising id and the user's tracking preference.
    ///
    /// Called once, from the resolver thread. May block.
    fn resolve(&self) -> Result<AdvertisingInfo, ProviderError>;
}

/// Deterministic one-way digest of the fallback identifier.
pub trait FallbackHasher: Send + Sync {
    fn digest(&self, source: &str) -> String;
}

/// Lowercase hex SHA-1, as the collection servers expect for `SHA1` ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Hasher;

impl FallbackHasher for Sha1Hasher {
    fn digest(&self, source: &str) -> String {
        hex::encode(Sha1::digest(source.as_bytes()))
    }
}

/// Provider for platforms without an advertising id service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvertisingId;

impl IdentityProvider for NoAdvertisingId {
    fn resolve(&self) -> Result<AdvertisingInfo, ProviderError> {
        Err(ProviderError::Unavailable)
    }
}

/// Provider that answers with a fixed advertising id.
///
/// Useful when the host application already holds the id, and in tests.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    info: AdvertisingInfo,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>, limited_tracking: bool) -> Self {
        Self {
            info: AdvertisingInfo {
                id: id.into(),
                limited_tracking,
            },
        }
    }
}

impl IdentityProvider for StaticProvider {
    fn resolve(&self) -> Result<AdvertisingInfo, ProviderError> {
        Ok(self.info.clone())
    }
}

/// Platform-stable identifier used when no advertising id is available.
///
/// Uses the host name, which survives restarts of the process.
pub fn platform_fallback_id() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_digest_format() {
        let digest = Sha1Hasher.digest("abc");
        assert_eq!(digest, "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_sha1_is_deterministic() {
        assert_eq!(Sha1Hasher.digest("device"), Sha1Hasher.digest("device"));
        assert_ne!(Sha1Hasher.digest("device"), Sha1Hasher.digest("other"));
    }

    #[test]
    fn test_no_advertising_id_is_unavailable() {
        assert!(matches!(
            NoAdvertisingId.resolve(),
            Err(ProviderError::Unavailable)
        ));
    }

    #[test]
    fn test_fallback_id_not_empty() {
        assert!(!platform_fallback_id().is_empty());
    }
}
