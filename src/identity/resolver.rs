//! One-shot background identity resolution.
//!
//! The resolver starts a single thread at construction. That thread asks the
//! provider for an advertising id, falls back to a hashed platform id, and
//! publishes the result exactly once. Until then every read observes `None`.

use super::provider::{FallbackHasher, IdentityProvider, ProviderError};
use super::types::Identity;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

/// Publish-once identity slot fed by a background thread.
#[derive(Debug)]
pub struct IdentityResolver {
    slot: Arc<OnceLock<Identity>>,
    /// Disconnects once the resolver thread has published and run its hook.
    done: Receiver<()>,
}

impl IdentityResolver {
    /// Start resolving on a new thread.
    ///
    /// `on_publish` runs on the resolver thread right after the identity
    /// becomes visible to readers. Fails only if the thread cannot be spawned.
    pub fn spawn<F>(
        provider: Option<Arc<dyn IdentityProvider>>,
        hasher: Arc<dyn FallbackHasher>,
        fallback_source: String,
        on_publish: F,
    ) -> std::io::Result<Self>
    where
        F: FnOnce(&Identity) + Send + 'static,
    {
        let slot = Arc::new(OnceLock::new());
        let (done_tx, done) = bounded::<()>(0);

        let thread_slot = Arc::clone(&slot);
        tracing::debug!("Starting thread which will gather id and ad tracking preferences");
        thread::Builder::new()
            .name("crowd-control-identity".to_string())
            .spawn(move || {
                let identity =
                    resolve_identity(provider.as_deref(), hasher.as_ref(), &fallback_source);
                tracing::debug!(
                    id = %identity.id,
                    kind = %identity.kind,
                    limited_tracking = identity.limited_tracking,
                    "Identity resolved"
                );
                let published = thread_slot.get_or_init(|| identity);
                on_publish(published);
                drop(done_tx);
            })?;

        Ok(Self { slot, done })
    }

    /// The published identity, or `None` while resolution is in flight.
    pub fn get(&self) -> Option<&Identity> {
        self.slot.get()
    }

    /// Whether the identity has been published.
    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Opt-out flag of the published identity; false while unresolved.
    pub fn limited_tracking(&self) -> bool {
        self.slot.get().map_or(false, |i| i.limited_tracking)
    }

    /// Block until the resolver thread has finished, or the timeout expires.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// Run the resolution steps synchronously.
///
/// A provider that errors, panics or is absent yields the hashed fallback.
pub fn resolve_identity(
    provider: Option<&dyn IdentityProvider>,
    hasher: &dyn FallbackHasher,
    fallback_source: &str,
) -> Identity {
    let outcome = match provider {
        Some(provider) => panic::catch_unwind(AssertUnwindSafe(|| provider.resolve()))
            .unwrap_or_else(|_| Err(ProviderError::Failed("provider panicked".to_string()))),
        None => Err(ProviderError::Unavailable),
    };

    match outcome {
        Ok(info) => {
            tracing::debug!("Advertising id service available");
            Identity::advertising(info.id, info.limited_tracking)
        }
        Err(e) => {
            tracing::debug!("Unable to access the advertising id ({e}); using the hashed device id");
            Identity::hashed(hasher.digest(fallback_source))
        }
    }
}
