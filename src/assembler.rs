//! Collection and extraction URL assembly.
//!
//! Collection URLs have the shape
//!
//! ```text
//! {scheme}://bcp.{domain}/5/c={client}/uid={id}/ua={kind}/e=app/rand={n}/{key=value/}*[dp=y/][pv=y/]
//! ```
//!
//! The part up to `e=app/` is fixed for the life of a client and is built
//! once, when the identity is published. Everything after it is rebuilt on
//! every flush from the drained queue and the session flags.

use crate::codec::{append_segment, SLASH};
use crate::config::{ClientConfig, Protocol};
use crate::identity::Identity;
use crate::queue::{BehaviorRecord, EventQueue, RecordKind};
use crate::session::SessionController;
use rand::Rng;
use std::sync::OnceLock;

pub const KEY_BEHAVIOR_ID: &str = "b";
pub const KEY_PAGE_VIEW: &str = "pv";
pub const KEY_COUNT_PLACEMENTS: &str = "dp";
pub const KEY_CLIENT_ID: &str = "c";
pub const KEY_RAND_NUMBER: &str = "rand";
pub const KEY_ID: &str = "uid";
pub const KEY_ENV_ID: &str = "e";
pub const KEY_DEVICE_TYPE: &str = "ua";

pub const VALUE_YES: &str = "y";
pub const VALUE_APP: &str = "app";

const BCP_SUBDOMAIN: &str = "bcp.";
const AE_SUBDOMAIN: &str = "ad.";
const SERVLET: &str = "5";

/// Builds the URLs for one client.
#[derive(Debug)]
pub struct UrlAssembler {
    protocol: Protocol,
    domain: String,
    client_id: u32,
    audience_client_id: u32,
    panorama_enabled: bool,
    prefix: OnceLock<String>,
}

impl UrlAssembler {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            protocol: config.protocol,
            domain: config.domain.clone(),
            client_id: config.client_id,
            audience_client_id: config.audience_client_id(),
            panorama_enabled: config.panorama_enabled,
            prefix: OnceLock::new(),
        }
    }

    /// Build the fixed prefix for `identity`. Later calls keep the first prefix.
    pub fn prime(&self, identity: &Identity) -> &str {
        self.prefix.get_or_init(|| {
            let mut url = format!(
                "{}://{}{}/{}/",
                self.protocol, BCP_SUBDOMAIN, self.domain, SERVLET
            );
            let fixed = [
                BehaviorRecord::new(KEY_CLIENT_ID, Some(self.client_id.to_string())),
                BehaviorRecord::with_kind(KEY_ID, Some(identity.id.clone()), RecordKind::Identity),
                BehaviorRecord::new(KEY_DEVICE_TYPE, Some(identity.kind.to_string())),
                BehaviorRecord::new(KEY_ENV_ID, Some(VALUE_APP.to_string())),
            ];
            for record in &fixed {
                append_segment(&mut url, record.key(), record.value());
            }
            tracing::debug!(
                client_id = self.client_id,
                protocol = %self.protocol,
                url = %url,
                "Collection prefix ready"
            );
            url
        })
    }

    /// The fixed prefix, once built.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.get().map(String::as_str)
    }

    pub fn is_primed(&self) -> bool {
        self.prefix.get().is_some()
    }

    /// Assemble a collection URL, draining `queue`.
    ///
    /// Returns `None`, leaving the queue and session untouched, when the
    /// prefix has not been built yet.
    pub fn bcp_url(&self, queue: &EventQueue, session: &SessionController) -> Option<String> {
        let nonce = rand::thread_rng().gen_range(0..i32::MAX as u32);
        self.bcp_url_with_nonce(nonce, queue, session)
    }

    /// [`Self::bcp_url`] with a caller-chosen nonce.
    pub fn bcp_url_with_nonce(
        &self,
        nonce: u32,
        queue: &EventQueue,
        session: &SessionController,
    ) -> Option<String> {
        let mut url = self.prefix()?.to_string();
        append_segment(&mut url, KEY_RAND_NUMBER, Some(&nonce.to_string()));

        for record in queue.drain_all() {
            append_segment(&mut url, record.key(), record.value());
            if record.kind() == RecordKind::PlacementOpportunity
                && session.claim_placement_marker()
            {
                append_segment(&mut url, KEY_COUNT_PLACEMENTS, Some(VALUE_YES));
            }
        }

        if session.needs_page_view() {
            append_segment(&mut url, KEY_PAGE_VIEW, Some(VALUE_YES));
        }
        Some(url)
    }

    /// Audience extraction URL for `identity`.
    pub fn audience_url(&self, identity: &Identity) -> String {
        let mut url = format!(
            "{}://{}{}/{}/pe={}/c={}/mid={}",
            self.protocol,
            AE_SUBDOMAIN,
            self.domain,
            SERVLET,
            VALUE_YES,
            self.audience_client_id,
            identity.id
        );
        if self.panorama_enabled {
            url.push(SLASH);
            url.push_str("rid=");
            url.push_str(VALUE_YES);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primed(config: &ClientConfig) -> UrlAssembler {
        let assembler = UrlAssembler::new(config);
        assembler.prime(&Identity::hashed("abc123"));
        assembler
    }

    fn push(queue: &EventQueue, key: &str, value: &str) {
        queue.push(BehaviorRecord::new(key, Some(value.to_string())));
    }

    #[test]
    fn test_prefix_format() {
        let assembler = primed(&ClientConfig::new(42));
        assert_eq!(
            assembler.prefix(),
            Some("http://bcp.crwdcntrl.net/5/c=42/uid=abc123/ua=SHA1/e=app/")
        );
    }

    #[test]
    fn test_prefix_written_once() {
        let assembler = primed(&ClientConfig::new(42));
        assembler.prime(&Identity::advertising("other", false));
        assert!(assembler.prefix().unwrap().contains("uid=abc123/"));
    }

    #[test]
    fn test_unprimed_leaves_queue_alone() {
        let assembler = UrlAssembler::new(&ClientConfig::new(1));
        let queue = EventQueue::new();
        let session = SessionController::new();
        push(&queue, "seg", "x");

        assert!(assembler.bcp_url(&queue, &session).is_none());
        assert_eq!(queue.len(), 1);
        assert!(session.needs_page_view());
    }

    #[test]
    fn test_full_url_order() {
        let assembler = primed(&ClientConfig::new(42));
        let queue = EventQueue::new();
        let session = SessionController::new();
        push(&queue, "seg", "poweruser");
        push(&queue, "p", "7");
        push(&queue, "p", "8");

        let url = assembler.bcp_url_with_nonce(99, &queue, &session).unwrap();
        assert_eq!(
            url,
            "http://bcp.crwdcntrl.net/5/c=42/uid=abc123/ua=SHA1/e=app/rand=99/\
             seg=poweruser/p=7/dp=y/p=8/pv=y/"
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_markers_respect_session_flags() {
        let assembler = primed(&ClientConfig::new(1));
        let queue = EventQueue::new();
        let session = SessionController::new();

        push(&queue, "p", "1");
        let first = assembler.bcp_url_with_nonce(1, &queue, &session).unwrap();
        assert!(first.contains("dp=y/"));
        session.mark_transmitted();

        push(&queue, "p", "2");
        let second = assembler.bcp_url_with_nonce(2, &queue, &session).unwrap();
        assert!(!second.contains("dp=y/"));
        assert!(!second.contains("pv=y/"));
    }

    #[test]
    fn test_values_are_encoded() {
        let assembler = primed(&ClientConfig::new(1));
        let queue = EventQueue::new();
        let session = SessionController::new();
        push(&queue, "seg", "a b/c");
        queue.push(BehaviorRecord::new("empty", None));

        let url = assembler.bcp_url_with_nonce(0, &queue, &session).unwrap();
        assert!(url.contains("/seg=a+b%2Fc/"));
        assert!(url.contains("/empty=/"));
    }

    #[test]
    fn test_random_nonce_in_range() {
        let assembler = primed(&ClientConfig::new(1));
        let queue = EventQueue::new();
        let session = SessionController::new();
        let url = assembler.bcp_url(&queue, &session).unwrap();
        let nonce: u64 = url
            .split('/')
            .find_map(|seg| seg.strip_prefix("rand="))
            .unwrap()
            .parse()
            .unwrap();
        assert!(nonce < i32::MAX as u64);
    }

    #[test]
    fn test_audience_url() {
        let identity = Identity::advertising("dev-1", false);
        let config = ClientConfig::new(42)
            .with_audience_client_id(77)
            .with_protocol(Protocol::Https);

        let plain = UrlAssembler::new(&config);
        assert_eq!(
            plain.audience_url(&identity),
            "https://ad.crwdcntrl.net/5/pe=y/c=77/mid=dev-1"
        );

        let panorama = UrlAssembler::new(&config.with_panorama(true));
        assert_eq!(
            panorama.audience_url(&identity),
            "https://ad.crwdcntrl.net/5/pe=y/c=77/mid=dev-1/rid=y"
        );
    }
}
