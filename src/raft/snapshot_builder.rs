//! Incremental snapshot builder
//!
//! The builder keeps a scratch [`State`] that is fed every applied command
//! through the same [`apply`] as the live state. It never looks at the live
//! state, so a snapshot it produces is exactly what replaying the log yields.

use tracing::{debug, info};

use crate::codec::CodecError;
use crate::command::{Command, LogEntry, Snapshot};
use crate::raft::interpreter::apply;
use crate::types::State;

/// Replays committed commands and emits compaction snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    scratch: State,
    entries_since_compaction: u64,
    threshold_entries: u64,
}

impl SnapshotBuilder {
    /// Create a builder that asks for compaction every `threshold_entries` commands.
    /// A threshold of 0 disables the request.
    pub fn new(threshold_entries: u64) -> Self {
        Self {
            scratch: State::new(),
            entries_since_compaction: 0,
            threshold_entries,
        }
    }

    /// Feed one committed command.
    pub fn apply(&mut self, command: &Command) {
        self.scratch = apply(&self.scratch, command);
        if command.is_snapshot() {
            self.entries_since_compaction = 0;
        } else {
            self.entries_since_compaction += 1;
        }
    }

    pub fn entries_since_compaction(&self) -> u64 {
        self.entries_since_compaction
    }

    /// Whether enough entries accumulated to compact the log.
    pub fn should_compact(&self) -> bool {
        self.threshold_entries > 0 && self.entries_since_compaction >= self.threshold_entries
    }

    /// Snapshot of everything replayed so far. Resets the entry counter.
    pub fn build(&mut self) -> Command {
        info!(
            entries = self.entries_since_compaction,
            state = %self.scratch,
            "building compaction snapshot"
        );
        self.entries_since_compaction = 0;
        Command::Snapshot(Snapshot::new(self.scratch.clone()))
    }

    /// [`build`](Self::build), framed for the consensus engine.
    pub fn build_entry(&mut self) -> Result<LogEntry, CodecError> {
        let command = self.build();
        let entry = LogEntry::from_command(&command)?;
        debug!(bytes = entry.len(), "snapshot entry framed");
        Ok(entry)
    }

    /// The replayed state.
    pub fn state(&self) -> &State {
        &self.scratch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{PushQueueItem, SetKeyValue};
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    #[test]
    fn compaction_threshold() {
        let mut builder = SnapshotBuilder::new(2);
        builder.apply(&SetKeyValue::new("a", Bytes::new()).into());
        assert!(!builder.should_compact());
        builder.apply(&SetKeyValue::new("b", Bytes::new()).into());
        assert!(builder.should_compact());

        let snapshot = builder.build();
        assert!(snapshot.is_snapshot());
        assert_eq!(builder.entries_since_compaction(), 0);
        assert!(!builder.should_compact());
    }

    #[test]
    fn zero_threshold_never_compacts() {
        let mut builder = SnapshotBuilder::new(0);
        for i in 0..10 {
            builder.apply(&SetKeyValue::new(format!("k{i}"), Bytes::new()).into());
        }
        assert!(!builder.should_compact());
    }

    #[test]
    fn snapshot_entry_restores_replayed_state() {
        let mut builder = SnapshotBuilder::new(10);
        builder.apply(&PushQueueItem::new("q", "e", Bytes::from_static(b"x"), 1, 10).into());
        let expected = builder.state().clone();

        let entry = builder.build_entry().unwrap();
        match entry.decode().unwrap() {
            Command::Snapshot(snapshot) => assert_eq!(snapshot.state, expected),
            other => panic!("unexpected command {other}"),
        }
    }

    #[test]
    fn installed_snapshot_resets_counter() {
        let mut builder = SnapshotBuilder::new(5);
        builder.apply(&SetKeyValue::new("a", Bytes::new()).into());
        builder.apply(&Snapshot::new(State::new()).into());
        assert_eq!(builder.entries_since_compaction(), 0);
        assert!(builder.state().is_empty());
    }
}
