//! Crowd Control - behavior collection and audience extraction client.
//!
//! This library buffers behavior events on the device and ships them to the
//! collection servers as a single encoded URL per flush, and retrieves the
//! audience membership document for the same device.
//!
//! # Privacy Guarantees
//!
//! - **Opt-out wins**: once the platform reports limited ad tracking, nothing
//!   is queued, sent or extracted
//! - **No raw device ids**: without an advertising id, only a SHA-1 digest of a
//!   platform-stable id is reported
//! - **No persistence**: undelivered events live in memory only
//! - **Transparency**: every queued, discarded and sent event is counted
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        CrowdControl                        │
//! ├────────────────────────────────────────────────────────────┤
//! │  add ──▶ ┌────────────┐  flush   ┌──────────────┐           │
//! │          │ EventQueue │─────────▶│ UrlAssembler │◀── flags ─┐│
//! │          └────────────┘          └──────────────┘           ││
//! │                ▲ opt-out gate       ▲       │     ┌────────┴┐│
//! │  ┌─────────────┴──────┐   prefix    │       │     │ Session ││
//! │  │  IdentityResolver  │─────────────┘       ▼     └─────────┘│
//! │  │ (background thread)│            ┌─────────────────┐       │
//! │  └────────────────────┘            │ DispatchGateway │       │
//! │                                    └────────┬────────┘       │
//! │                                             ▼ Transport      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use crowd_control::{ClientConfig, CrowdControl};
//! use std::time::Duration;
//!
//! let cc = CrowdControl::new(ClientConfig::new(42)).expect("client");
//!
//! // Events may be added before the identity is resolved.
//! cc.add("seg", "poweruser");
//! cc.add_opportunity(7);
//!
//! if cc.wait_until_ready(Duration::from_secs(5)) && !cc.is_opted_out() {
//!     cc.flush_sync().expect("collection call");
//!     let audiences = cc.read_audience(Duration::from_secs(5));
//!     println!("{audiences:?}");
//! }
//! ```

pub mod assembler;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod queue;
pub mod session;
pub mod transparency;
pub mod transport;

// Re-export key types at crate root for convenience
pub use client::{CrowdControl, CrowdControlBuilder};
pub use config::{ClientConfig, ConfigError, OptOutPolicy, Protocol};
pub use dispatch::{DispatchGateway, SendHandle, SendOutcome};
pub use error::ClientError;
pub use identity::{
    AdvertisingInfo, FallbackHasher, IdKind, Identity, IdentityProvider, NoAdvertisingId,
    ProviderError, Sha1Hasher, StaticProvider,
};
pub use queue::{BehaviorRecord, EventQueue, RecordKind};
pub use session::{SessionController, SessionState};
pub use transparency::{TransparencyLog, TransparencyStats};
pub use transport::{MockTransport, Transport, TransportError};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy notice that can be displayed to users.
pub const PRIVACY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║               CROWD CONTROL CLIENT - PRIVACY NOTICE              ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This client reports app-supplied behavior tags for audience     ║
║  measurement.                                                    ║
║                                                                  ║
║  ✓ WHAT WE SEND:                                                 ║
║    • Behavior and placement tags added by the application        ║
║    • The advertising id, or a SHA-1 digest of a device id        ║
║    • Whether this is the first call of the session               ║
║                                                                  ║
║  ✗ WHAT WE NEVER DO:                                             ║
║    • Collect, send or extract anything when ad tracking is       ║
║      limited on this device                                      ║
║    • Send the raw device id                                      ║
║    • Store undelivered events on disk                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_notice_contents() {
        assert!(PRIVACY_NOTICE.contains("PRIVACY"));
        assert!(PRIVACY_NOTICE.contains("NEVER DO"));
        assert!(PRIVACY_NOTICE.contains("ad tracking is"));
    }
}
