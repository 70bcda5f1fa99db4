//! Core types and data structures for raft-store
//!
//! This module defines the canonical [`State`] replicated by every node and the
//! queue element model the lease protocol works on. All collections come from
//! the `im` crate: cloning a [`State`] is O(1) and every mutation produces a new
//! value while older values stay valid for readers still holding them.

use bytes::Bytes;
use im::{OrdMap, OrdSet, Vector};
use std::fmt;

/// Logical timestamp carried inside commands.
pub type Tick = i64;

/// Ticks in one second (100 ns resolution).
pub const TICKS_PER_SECOND: Tick = 10_000_000;

/// Callback outcome that deletes an element regardless of retryability.
pub const DELETE_ELEMENT_CODE: i32 = 1000;

/// Outcome recorded when a lease attempt times out without a callback.
pub const TIMEOUT_CODE: i32 = 504;

/// Suffix of the companion key holding a key-value expiry tick.
pub const TIME_TO_LIVE_SUFFIX: &str = "${slimfaas-timetolive}$";

/// Hashset field holding the map's expiry tick.
pub const HASHSET_TTL_FIELD: &str = "__ttl__";

/// Convert a whole number of seconds to ticks.
pub fn ticks_from_secs(secs: u32) -> Tick {
    Tick::from(secs) * TICKS_PER_SECOND
}

/// Name of the companion key that stores the expiry of `key`.
pub fn time_to_live_key(key: &str) -> String {
    format!("{key}{TIME_TO_LIVE_SUFFIX}")
}

/// One lease attempt on a queue element.
///
/// Attempts are values: closing one builds a replacement rather than editing
/// the record a reader may still hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttempt {
    /// Tick the lease was granted
    pub start: Tick,
    /// Tick the attempt was closed, `None` while open
    pub end: Option<Tick>,
    /// Outcome code, 0 while open
    pub outcome: i32,
    /// Lease owner
    pub transaction_id: String,
}

impl QueueAttempt {
    /// A freshly granted lease.
    pub fn open(start: Tick, transaction_id: impl Into<String>) -> Self {
        Self {
            start,
            end: None,
            outcome: 0,
            transaction_id: transaction_id.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// This attempt closed at `end` with `outcome`.
    pub fn closed(&self, end: Tick, outcome: i32) -> Self {
        Self {
            start: self.start,
            end: Some(end),
            outcome,
            transaction_id: self.transaction_id.clone(),
        }
    }
}

/// One work item awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueElement {
    /// Caller-supplied identifier, unique within its queue
    pub id: String,
    /// Opaque payload
    pub value: Bytes,
    /// Tick of the push
    pub insert_tick: Tick,
    /// Visibility timeout of one lease attempt
    pub http_timeout: Tick,
    /// Wait before retry `n` becomes available, one entry per permitted retry
    pub timeout_retries: Vector<Tick>,
    /// Lease history; only the last entry may be open
    pub attempts: Vector<QueueAttempt>,
    /// Outcome codes that do not finish the element
    pub retryable_codes: OrdSet<i32>,
}

impl QueueElement {
    /// An element that has never been leased.
    pub fn new(
        id: impl Into<String>,
        value: impl Into<Bytes>,
        insert_tick: Tick,
        http_timeout: Tick,
    ) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            insert_tick,
            http_timeout,
            timeout_retries: Vector::new(),
            attempts: Vector::new(),
            retryable_codes: OrdSet::new(),
        }
    }

    pub fn with_retries(mut self, retries: impl IntoIterator<Item = Tick>) -> Self {
        self.timeout_retries = retries.into_iter().collect();
        self
    }

    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.retryable_codes = codes.into_iter().collect();
        self
    }

    pub fn last_attempt(&self) -> Option<&QueueAttempt> {
        self.attempts.last()
    }

    /// Number of lease attempts so far.
    pub fn try_count(&self) -> usize {
        self.attempts.len()
    }

    /// Whether the latest attempt was granted to `transaction_id`.
    pub fn is_leased_by(&self, transaction_id: &str) -> bool {
        self.last_attempt()
            .is_some_and(|attempt| attempt.transaction_id == transaction_id)
    }

    /// Whether any attempt, open or closed, belongs to `transaction_id`.
    pub fn has_attempt_by(&self, transaction_id: &str) -> bool {
        self.attempts
            .iter()
            .any(|attempt| attempt.transaction_id == transaction_id)
    }

    /// Copy with a new open attempt appended.
    pub fn leased(&self, now: Tick, transaction_id: &str) -> Self {
        let mut next = self.clone();
        next.attempts.push_back(QueueAttempt::open(now, transaction_id));
        next
    }

    /// Copy with the last attempt closed. Unchanged when no attempt is open.
    pub fn with_last_attempt_closed(&self, end: Tick, outcome: i32) -> Self {
        let mut next = self.clone();
        let last = next.attempts.len().checked_sub(1);
        if let Some(index) = last {
            if next.attempts[index].is_open() {
                let closed = next.attempts[index].closed(end, outcome);
                next.attempts.set(index, closed);
            }
        }
        next
    }
}

/// The canonical replicated state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub key_values: OrdMap<String, Bytes>,
    pub hashsets: OrdMap<String, OrdMap<String, Bytes>>,
    pub queues: OrdMap<String, Vector<QueueElement>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.key_values.is_empty() && self.hashsets.is_empty() && self.queues.is_empty()
    }

    /// Elements of `queue`, empty when the queue does not exist.
    pub fn queue(&self, queue: &str) -> Vector<QueueElement> {
        self.queues.get(queue).cloned().unwrap_or_default()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements: usize = self.queues.values().map(Vector::len).sum();
        write!(
            f,
            "State({} keys, {} hashsets, {} queues / {} elements)",
            self.key_values.len(),
            self.hashsets.len(),
            self.queues.len(),
            elements
        )
    }
}
