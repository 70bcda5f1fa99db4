//! Persistent-state adapter
//!
//! [`PersistentState`] sits between the consensus engine and the rest of the
//! platform. The engine delivers committed entries in log order through
//! [`apply`](PersistentState::apply); readers call
//! [`invoke`](PersistentState::invoke) and get an immutable `Arc<State>`
//! without taking any lock.
//!
//! A corrupt entry halts the adapter: further entries and reads are refused
//! until a trusted snapshot is installed with
//! [`install_snapshot`](PersistentState::install_snapshot).

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::config::{SnapshotConfig, StoreConfig};
use crate::error::{Result, StoreError};
use crate::logging::node_span;
use crate::raft::consensus::{CommittedEntry, ConsensusEngine};
use crate::raft::interpreter::apply;
use crate::raft::snapshot_builder::SnapshotBuilder;
use crate::types::State;

/// Single-writer, lock-free-reader holder of the canonical state.
#[derive(Debug)]
pub struct PersistentState {
    state: ArcSwap<State>,
    // serializes writers; readers never touch it
    builder: Mutex<SnapshotBuilder>,
    applied_index: AtomicU64,
    started: AtomicBool,
    halted: AtomicBool,
    node_name: Option<String>,
    span: Span,
}

impl PersistentState {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self::build(config, None)
    }

    /// Adapter whose log output carries the configured node name.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::build(&config.snapshot, config.node_name.clone())
    }

    fn build(config: &SnapshotConfig, node_name: Option<String>) -> Self {
        let threshold = if config.enabled {
            config.threshold_entries
        } else {
            0
        };
        Self {
            state: ArcSwap::from_pointee(State::new()),
            builder: Mutex::new(SnapshotBuilder::new(threshold)),
            applied_index: AtomicU64::new(0),
            started: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            span: node_span(node_name.as_deref()),
            node_name,
        }
    }

    /// Install the engine's latest snapshot, if any, then accept entries.
    pub async fn start<E: ConsensusEngine>(&self, engine: &E) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        match engine.latest_snapshot().instrument(self.span.clone()).await? {
            Some(snapshot) => self.install_snapshot(&snapshot)?,
            None => debug!("no startup snapshot, starting from empty state"),
        }
        self.started.store(true, Ordering::Release);
        self.span.in_scope(|| {
            info!(applied_index = self.applied_index(), "persistent state started")
        });
        Ok(())
    }

    /// Apply one committed entry. Entries must arrive with strictly increasing indices.
    pub fn apply(&self, committed: &CommittedEntry) -> Result<()> {
        let _entered = self.span.enter();
        if !self.is_started() {
            return Err(StoreError::NotReady {
                operation: "apply".to_string(),
                reason: "startup snapshot not installed".to_string(),
            });
        }

        let mut builder = self.builder.lock();
        let applied_index = self.applied_index();
        if self.is_halted() {
            return Err(StoreError::Halted { applied_index });
        }
        if committed.index <= applied_index {
            return Err(StoreError::OutOfOrder {
                index: committed.index,
                applied_index,
            });
        }

        if committed.entry.is_empty() {
            self.applied_index.store(committed.index, Ordering::Release);
            return Ok(());
        }

        let command = match committed.entry.decode() {
            Ok(command) => command,
            Err(source) => {
                self.halted.store(true, Ordering::Release);
                error!(
                    index = committed.index,
                    applied_index,
                    error = %source,
                    "corrupt log entry, halting until a snapshot is installed"
                );
                return Err(StoreError::decode_error("apply", committed.index, source));
            }
        };

        let next = apply(&self.state.load(), &command);
        self.state.store(Arc::new(next));
        builder.apply(&command);
        self.applied_index.store(committed.index, Ordering::Release);
        debug!(index = committed.index, command = command.name(), "entry applied");
        Ok(())
    }

    /// Replace the state with a snapshot entry. The entry is decoded in full
    /// before anything is swapped; a failure leaves the current state in place.
    ///
    /// A running node refuses a snapshot older than its applied index; a
    /// halted node accepts any index since its own state is no longer trusted.
    pub fn install_snapshot(&self, committed: &CommittedEntry) -> Result<()> {
        let _entered = self.span.enter();
        let command = committed
            .entry
            .decode()
            .map_err(|source| StoreError::decode_error("install_snapshot", committed.index, source))?;
        if !command.is_snapshot() {
            return Err(StoreError::snapshot_error(
                "install",
                format!("entry {} carries {}", committed.index, command.name()),
            ));
        }

        let mut builder = self.builder.lock();
        let applied_index = self.applied_index();
        if !self.is_halted() && committed.index < applied_index {
            warn!(index = committed.index, applied_index, "refusing stale snapshot");
            return Err(StoreError::OutOfOrder {
                index: committed.index,
                applied_index,
            });
        }

        let next = apply(&self.state.load(), &command);
        self.state.store(Arc::new(next));
        builder.apply(&command);
        self.applied_index.store(committed.index, Ordering::Release);
        if self.halted.swap(false, Ordering::AcqRel) {
            warn!(index = committed.index, "resynchronized from snapshot, resuming");
        }
        info!(index = committed.index, state = %self.state.load_full(), "snapshot installed");
        Ok(())
    }

    /// Current state for read-only use. Never blocks.
    pub fn invoke(&self) -> Result<Arc<State>> {
        if self.is_halted() {
            return Err(StoreError::Halted {
                applied_index: self.applied_index(),
            });
        }
        Ok(self.state.load_full())
    }

    /// Whether the snapshot builder reached its compaction threshold.
    pub fn needs_compaction(&self) -> bool {
        self.builder.lock().should_compact()
    }

    /// Build a compaction snapshot covering everything applied so far.
    pub fn build_snapshot(&self) -> Result<CommittedEntry> {
        let mut builder = self.builder.lock();
        if self.is_halted() {
            return Err(StoreError::Halted {
                applied_index: self.applied_index(),
            });
        }
        let entry = builder
            .build_entry()
            .map_err(|e| StoreError::snapshot_error("build", e.to_string()))?;
        Ok(CommittedEntry::new(self.applied_index(), entry))
    }

    pub fn applied_index(&self) -> u64 {
        self.applied_index.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }
}

impl Default for PersistentState {
    fn default() -> Self {
        Self::new(&SnapshotConfig::default())
    }
}
