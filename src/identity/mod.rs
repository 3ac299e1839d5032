//! Device identity resolution.
//!
//! This module determines which identifier the client reports and whether
//! the user has asked to limit ad tracking. Resolution runs once, on a
//! background thread, and falls back to a hashed platform identifier when
//! no advertising id can be obtained.

pub mod provider;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use provider::{
    platform_fallback_id, AdvertisingInfo, FallbackHasher, IdentityProvider, NoAdvertisingId,
    ProviderError, Sha1Hasher, StaticProvider,
};
pub use resolver::IdentityResolver;
pub use types::{IdKind, Identity};
