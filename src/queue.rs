//! Pending behavior records awaiting dispatch.
//!
//! The queue is the only state shared between producers calling `add` and
//! the flush path. All mutations and the drain go through one mutex, so a
//! record added concurrently with a drain lands in exactly one batch.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Parameter key that marks a placement opportunity.
pub const KEY_PLACEMENT_ID: &str = "p";

/// How a record is treated during URL assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Ordinary behavior tag.
    Default,
    /// An ad slot was shown; triggers the placement-count marker.
    PlacementOpportunity,
    /// The device identifier parameter of the URL prefix.
    Identity,
}

/// A single key/value pair bound for the collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    key: String,
    value: Option<String>,
    kind: RecordKind,
}

impl BehaviorRecord {
    /// Create a record, classifying it from its key.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        let key = key.into();
        let kind = if key == KEY_PLACEMENT_ID {
            RecordKind::PlacementOpportunity
        } else {
            RecordKind::Default
        };
        Self { key, value, kind }
    }

    /// Create a record with an explicit kind.
    pub fn with_kind(key: impl Into<String>, value: Option<String>, kind: RecordKind) -> Self {
        Self {
            key: key.into(),
            value,
            kind,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }
}

/// Thread-safe FIFO of behavior records.
#[derive(Debug, Default)]
pub struct EventQueue {
    records: Mutex<VecDeque<BehaviorRecord>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record unless `reject` returns true.
    ///
    /// `reject` is evaluated while the queue lock is held, so a purge that
    /// runs after the rejecting condition becomes true can never miss a
    /// record admitted just before it.
    pub fn push_unless(&self, record: BehaviorRecord, reject: impl FnOnce() -> bool) -> bool {
        let mut records = self.lock();
        if reject() {
            return false;
        }
        records.push_back(record);
        true
    }

    /// Append a record unconditionally.
    pub fn push(&self, record: BehaviorRecord) {
        self.lock().push_back(record);
    }

    /// Remove and return every queued record in insertion order.
    pub fn drain_all(&self) -> Vec<BehaviorRecord> {
        self.lock().drain(..).collect()
    }

    /// Discard everything, returning how many records were dropped.
    pub fn clear(&self) -> usize {
        let mut records = self.lock();
        let dropped = records.len();
        records.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BehaviorRecord>> {
        // A producer that panicked mid-push cannot leave the deque torn.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
