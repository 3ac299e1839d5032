//! Collection and dispatch counters.
//!
//! Counts only; no keys, values or identifiers are retained here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Counters for one client instance.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Events accepted into the queue
    events_queued: AtomicU64,
    /// Events refused or purged because the user opted out
    events_discarded: AtomicU64,
    /// Collection requests that completed
    flushes_sent: AtomicU64,
    /// Collection requests that failed
    flushes_failed: AtomicU64,
    /// Audience extraction requests issued
    audience_reads: AtomicU64,
    /// Start of the current session
    session_start: Mutex<DateTime<Utc>>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            events_queued: AtomicU64::new(0),
            events_discarded: AtomicU64::new(0),
            flushes_sent: AtomicU64::new(0),
            flushes_failed: AtomicU64::new(0),
            audience_reads: AtomicU64::new(0),
            session_start: Mutex::new(Utc::now()),
        }
    }

    pub fn record_event_queued(&self) {
        self.events_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_discarded(&self, count: u64) {
        self.events_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_flush_sent(&self) {
        self.flushes_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failed(&self) {
        self.flushes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audience_read(&self) {
        self.audience_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the start of a new session.
    pub fn restart_session(&self) {
        *self
            .session_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Utc::now();
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        let session_start = *self
            .session_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        TransparencyStats {
            events_queued: self.events_queued.load(Ordering::Relaxed),
            events_discarded: self.events_discarded.load(Ordering::Relaxed),
            flushes_sent: self.flushes_sent.load(Ordering::Relaxed),
            flushes_failed: self.flushes_failed.load(Ordering::Relaxed),
            audience_reads: self.audience_reads.load(Ordering::Relaxed),
            session_start,
            session_duration_secs: (Utc::now() - session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Events queued: {}\n\
             - Events discarded (opted out): {}\n\
             - Collection calls sent: {}\n\
             - Collection calls failed: {}\n\
             - Audience reads: {}\n\
             - Session duration: {} seconds",
            stats.events_queued,
            stats.events_discarded,
            stats.flushes_sent,
            stats.flushes_failed,
            stats.audience_reads,
            stats.session_duration_secs
        )
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub events_queued: u64,
    pub events_discarded: u64,
    pub flushes_sent: u64,
    pub flushes_failed: u64,
    pub audience_reads: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_event_queued();
        log.record_event_queued();
        log.record_events_discarded(3);
        log.record_flush_sent();

        let stats = log.stats();
        assert_eq!(stats.events_queued, 2);
        assert_eq!(stats.events_discarded, 3);
        assert_eq!(stats.flushes_sent, 1);
        assert_eq!(stats.flushes_failed, 0);
    }

    #[test]
    fn test_restart_session_moves_start() {
        let log = TransparencyLog::new();
        let before = log.stats().session_start;
        std::thread::sleep(std::time::Duration::from_millis(5));
        log.restart_session();
        assert!(log.stats().session_start > before);
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Events queued"));
        assert!(summary.contains("Collection calls sent"));
        assert!(summary.contains("Session duration"));
    }
}
