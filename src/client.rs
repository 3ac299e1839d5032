//! The Crowd Control client.
//!
//! [`CrowdControl`] ties the pieces together: it owns the event queue, the
//! identity slot, the session flags and the dispatch gateway, and exposes the
//! public collection and extraction calls.
//!
//! Nothing is collected or sent once the resolved identity reports limited
//! ad tracking. Calls that would send before the identity is known return
//! quietly; use [`CrowdControl::is_ready`] to tell the cases apart.

use crate::assembler::{UrlAssembler, KEY_BEHAVIOR_ID};
use crate::config::{ClientConfig, OptOutPolicy};
use crate::dispatch::{DispatchGateway, SendHandle, SendOutcome};
use crate::error::ClientError;
use crate::identity::{
    platform_fallback_id, FallbackHasher, IdKind, Identity, IdentityProvider, IdentityResolver,
    Sha1Hasher,
};
use crate::queue::{BehaviorRecord, EventQueue, KEY_PLACEMENT_ID};
use crate::session::SessionController;
use crate::transparency::{TransparencyLog, TransparencyStats};
use crate::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Macro replaced by the device id in [`CrowdControl::send_request`].
pub const MACRO_DEVICE_ID: &str = "{deviceid}";
/// Macro replaced by the id kind in [`CrowdControl::send_request`].
pub const MACRO_DEVICE_ID_TYPE: &str = "{deviceidtype}";

/// State touched by both caller threads and the resolver thread.
#[derive(Debug)]
struct Shared {
    queue: EventQueue,
    assembler: UrlAssembler,
    log: TransparencyLog,
}

/// Behavior collection and audience extraction client.
pub struct CrowdControl {
    config: ClientConfig,
    shared: Arc<Shared>,
    resolver: IdentityResolver,
    session: SessionController,
    gateway: DispatchGateway,
    /// Held only while a flush drains the queue and sets session flags.
    assemble_lock: Mutex<()>,
    /// Serializes synchronous flushes, including their transport call.
    sync_lock: Mutex<()>,
}

/// Builder for [`CrowdControl`].
pub struct CrowdControlBuilder {
    config: ClientConfig,
    provider: Option<Arc<dyn IdentityProvider>>,
    hasher: Arc<dyn FallbackHasher>,
    fallback_id: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl CrowdControlBuilder {
    /// Source of the advertising id. Without one, the hashed fallback is used.
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Digest applied to the fallback id.
    pub fn fallback_hasher(mut self, hasher: Arc<dyn FallbackHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Platform-stable id to hash when no advertising id is available.
    /// Defaults to [`platform_fallback_id`].
    pub fn fallback_id(mut self, id: impl Into<String>) -> Self {
        self.fallback_id = Some(id.into());
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client and start identity resolution.
    pub fn build(self) -> Result<CrowdControl, ClientError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let shared = Arc::new(Shared {
            queue: EventQueue::new(),
            assembler: UrlAssembler::new(&self.config),
            log: TransparencyLog::new(),
        });

        let hook_shared = Arc::clone(&shared);
        let policy = self.config.opt_out_policy;
        let resolver = IdentityResolver::spawn(
            self.provider,
            self.hasher,
            self.fallback_id.unwrap_or_else(platform_fallback_id),
            move |identity| on_identity_published(&hook_shared, policy, identity),
        )?;

        Ok(CrowdControl {
            gateway: DispatchGateway::new(transport, self.config.timeout),
            config: self.config,
            shared,
            resolver,
            session: SessionController::new(),
            assemble_lock: Mutex::new(()),
            sync_lock: Mutex::new(()),
        })
    }
}

#[cfg(feature = "http")]
fn default_transport() -> Result<Arc<dyn Transport>, ClientError> {
    let transport = crate::transport::HttpTransport::new()?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> Result<Arc<dyn Transport>, ClientError> {
    Err(ClientError::NoTransport)
}

fn on_identity_published(shared: &Shared, policy: OptOutPolicy, identity: &Identity) {
    shared.assembler.prime(identity);
    if identity.limited_tracking && policy == OptOutPolicy::Purge {
        let dropped = shared.queue.clear();
        shared.log.record_events_discarded(dropped as u64);
        tracing::debug!(dropped, "Limited ad tracking; purged queued events");
    }
}

impl CrowdControl {
    /// Start building a client for `config`.
    pub fn builder(config: ClientConfig) -> CrowdControlBuilder {
        CrowdControlBuilder {
            config,
            provider: None,
            hasher: Arc::new(Sha1Hasher),
            fallback_id: None,
            transport: None,
        }
    }

    /// Client with the default HTTP transport and no advertising id provider.
    #[cfg(feature = "http")]
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::builder(config).build()
    }

    /// Queue a key/value pair for the next flush.
    ///
    /// Ignored when the user has opted out. Before the identity is known the
    /// event is queued anyway.
    pub fn add(&self, key: &str, value: &str) {
        self.add_optional(key, Some(value));
    }

    /// Like [`Self::add`]; a missing value is sent as an empty string.
    pub fn add_optional(&self, key: &str, value: Option<&str>) {
        let record = BehaviorRecord::new(key, value.map(str::to_string));
        let accepted = self
            .shared
            .queue
            .push_unless(record, || self.resolver.limited_tracking());

        if accepted {
            self.shared.log.record_event_queued();
            tracing::debug!(key, value = value.unwrap_or_default(), "adds type and value");
        } else {
            self.shared.log.record_events_discarded(1);
        }
    }

    /// Track a behavior by id.
    pub fn add_behavior(&self, id: u64) {
        self.add(KEY_BEHAVIOR_ID, &id.to_string());
    }

    /// Track an opportunity against the placement with the given id.
    pub fn add_opportunity(&self, id: u64) {
        self.add(KEY_PLACEMENT_ID, &id.to_string());
    }

    /// Send everything queued since the last flush and wait for the response.
    ///
    /// Returns `Ok(())` without sending when the client is not ready or the
    /// user has opted out. Queued events are consumed even if the request
    /// fails.
    pub fn flush_sync(&self) -> Result<(), ClientError> {
        let _sync = lock(&self.sync_lock);

        let assembled = {
            let _guard = lock(&self.assemble_lock);
            self.assemble()
        };
        let Some(url) = assembled else {
            return Ok(());
        };

        match self.gateway.send_sync(&url) {
            Ok(_) => {
                self.session.mark_transmitted();
                self.shared.log.record_flush_sent();
                Ok(())
            }
            Err(e) => {
                self.shared.log.record_flush_failed();
                Err(e.into())
            }
        }
    }

    /// Send everything queued since the last flush without waiting.
    ///
    /// Returns `None` when nothing was dispatched. The session counts as
    /// transmitted as soon as the request is started.
    pub fn flush_async(&self) -> Option<SendHandle> {
        let url = {
            let _guard = lock(&self.assemble_lock);
            let url = self.assemble()?;
            self.session.mark_transmitted();
            url
        };

        let shared = Arc::clone(&self.shared);
        Some(self.gateway.send_async_with(url, true, move |outcome| {
            if outcome.is_delivered() {
                shared.log.record_flush_sent();
            } else {
                shared.log.record_flush_failed();
            }
        }))
    }

    /// Fetch the audience membership JSON for this device.
    ///
    /// Waits at most `timeout`. Returns `None` when not ready, opted out, on
    /// failure or on timeout.
    pub fn read_audience(&self, timeout: Duration) -> Option<String> {
        if self.is_opted_out() {
            tracing::debug!("Ad tracking is limited; read_audience returning no result");
            return None;
        }
        if !self.is_ready() {
            return None;
        }
        let identity = self.resolver.get()?;

        let url = self.shared.assembler.audience_url(identity);
        self.shared.log.record_audience_read();
        match self.gateway.send_async(url).wait(timeout) {
            SendOutcome::Delivered(body) => Some(body),
            outcome => {
                tracing::debug!(?outcome, "Error retrieving audience data");
                None
            }
        }
    }

    /// Issue a GET to a caller-supplied URL pattern.
    ///
    /// `{deviceid}` and `{deviceidtype}` are replaced with the resolved
    /// identity. Custom headers are not sent with this request.
    pub fn send_request(&self, url_pattern: &str) -> Option<SendHandle> {
        if !self.can_dispatch() {
            return None;
        }
        let identity = self.resolver.get()?;
        if identity.id.is_empty() {
            return None;
        }

        let url = url_pattern
            .replace(MACRO_DEVICE_ID, &identity.id)
            .replace(MACRO_DEVICE_ID_TYPE, identity.kind.as_str());
        Some(self.gateway.send_async_bare(url))
    }

    /// Begin a new session; the next flush counts as a page view again.
    pub fn start_session(&self) {
        self.session.start_session();
        self.shared.log.restart_session();
    }

    /// Identity resolved and the client can send.
    pub fn is_ready(&self) -> bool {
        self.resolver.is_resolved() && self.shared.assembler.is_primed()
    }

    /// The user asked to limit ad tracking. False until the identity is known.
    pub fn is_opted_out(&self) -> bool {
        self.resolver.limited_tracking()
    }

    /// Block until the client is ready or `timeout` expires.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        self.resolver.wait(timeout) && self.is_ready()
    }

    /// Set a custom header for all later requests.
    ///
    /// `User-Agent` and `Accept-Charset` cannot be overridden.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.gateway.set_header(name, value);
    }

    /// The custom header value stored for `name`.
    pub fn header(&self, name: &str) -> Option<String> {
        self.gateway.header(name)
    }

    /// The reported id, once resolved.
    pub fn id(&self) -> Option<String> {
        self.resolver.get().map(|i| i.id.clone())
    }

    pub fn id_kind(&self) -> Option<IdKind> {
        self.resolver.get().map(|i| i.kind)
    }

    pub fn identity(&self) -> Option<Identity> {
        self.resolver.get().cloned()
    }

    /// The advertising id provider answered.
    pub fn is_advertising_id_available(&self) -> bool {
        self.resolver.get().map_or(false, |i| i.resolver_available)
    }

    /// Events waiting for the next flush.
    pub fn pending_events(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> TransparencyStats {
        self.shared.log.stats()
    }

    pub fn summary(&self) -> String {
        self.shared.log.summary()
    }

    fn can_dispatch(&self) -> bool {
        self.is_ready() && !self.is_opted_out()
    }

    /// Build the collection URL, draining the queue. Caller holds `assemble_lock`.
    fn assemble(&self) -> Option<String> {
        if !self.can_dispatch() {
            return None;
        }
        let url = self
            .shared
            .assembler
            .bcp_url(&self.shared.queue, &self.session)?;
        tracing::debug!(url = %url, "Collection URL assembled");
        Some(url)
    }
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for CrowdControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrowdControl")
            .field("config", &self.config)
            .field("identity", &self.resolver.get())
            .field("pending_events", &self.shared.queue.len())
            .finish_non_exhaustive()
    }
}
