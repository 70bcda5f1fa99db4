//! Seam to the external consensus engine.
//!
//! The engine orders and replicates [`LogEntry`] values; committed entries come
//! back through [`PersistentState::apply`](crate::raft::PersistentState::apply).
//! Leader election, log shipping and membership live on the other side of
//! this trait.

use std::future::Future;

use crate::command::LogEntry;
use crate::error::Result;

/// A committed entry together with its log index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedEntry {
    pub index: u64,
    pub entry: LogEntry,
}

impl CommittedEntry {
    pub fn new(index: u64, entry: LogEntry) -> Self {
        Self { index, entry }
    }
}

/// Replication boundary consumed by the store.
pub trait ConsensusEngine: Send + Sync {
    /// Submit an entry. Resolves once the engine accepted or rejected it; the
    /// entry becomes visible only after it is committed and applied.
    fn replicate(&self, entry: LogEntry) -> impl Future<Output = Result<()>> + Send;

    /// The most recent snapshot the engine holds, installed at startup.
    fn latest_snapshot(&self) -> impl Future<Output = Result<Option<CommittedEntry>>> + Send;
}
