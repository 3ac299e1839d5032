//! Per-session transmission state.
//!
//! A session runs from client construction (or [`SessionController::start_session`])
//! until the next reset. Only the first successful flush of a session carries
//! the page-view marker, and the placement-count marker is emitted at most
//! once per session.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// Flags consulted and updated by URL assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// A flush of this session has been delivered.
    pub transmitted: bool,
    /// The placement-count marker has been appended in this session.
    pub placements_flag_emitted: bool,
}

/// Guards the session flags for one client.
#[derive(Debug, Default)]
pub struct SessionController {
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to a fresh session.
    pub fn start_session(&self) {
        *self.lock() = SessionState::default();
        tracing::debug!("Starting new CrowdControl session");
    }

    /// Record a delivered flush.
    pub fn mark_transmitted(&self) {
        self.lock().transmitted = true;
    }

    /// Current flags.
    pub fn snapshot(&self) -> SessionState {
        *self.lock()
    }

    /// Whether the next flush still owes the page-view marker.
    pub fn needs_page_view(&self) -> bool {
        !self.lock().transmitted
    }

    /// Claim the placement-count marker for this session.
    ///
    /// Returns true exactly once between resets.
    pub fn claim_placement_marker(&self) -> bool {
        let mut state = self.lock();
        if state.placements_flag_emitted {
            false
        } else {
            state.placements_flag_emitted = true;
            true
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_needs_page_view() {
        let session = SessionController::new();
        assert!(session.needs_page_view());
        session.mark_transmitted();
        assert!(!session.needs_page_view());
    }

    #[test]
    fn test_placement_marker_claimed_once() {
        let session = SessionController::new();
        assert!(session.claim_placement_marker());
        assert!(!session.claim_placement_marker());
        assert!(!session.claim_placement_marker());
    }

    #[test]
    fn test_start_session_resets_both_flags() {
        let session = SessionController::new();
        session.mark_transmitted();
        session.claim_placement_marker();

        session.start_session();
        assert_eq!(session.snapshot(), SessionState::default());
        assert!(session.claim_placement_marker());
    }
}
