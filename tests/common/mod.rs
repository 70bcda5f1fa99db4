//! Common test utilities for raft-store tests.

use bytes::Bytes;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use raft_store::command::{
    CallbackOutcome, Command, DeleteHashset, DeleteKeyValue, LeaseQueueItems, LogEntry,
    PushQueueItem, PushQueueItemBatch, RecordCallback, RecordCallbackBatch, SetHashset,
    SetKeyValue,
};
use raft_store::config::SnapshotConfig;
use raft_store::raft::{CommittedEntry, ConsensusEngine, PersistentState};
use raft_store::{Result, StoreError};

/// Frame `command` as the committed entry at `index`.
#[allow(dead_code)]
pub fn committed(index: u64, command: impl Into<Command>) -> CommittedEntry {
    let entry = LogEntry::from_command(&command.into()).expect("command frames");
    CommittedEntry::new(index, entry)
}

/// A started adapter with the given compaction threshold.
#[allow(dead_code)]
pub async fn started_state(threshold_entries: u64) -> Arc<PersistentState> {
    let state = Arc::new(PersistentState::new(&SnapshotConfig {
        enabled: true,
        threshold_entries,
    }));
    let engine = LoopbackEngine::new(state.clone());
    state.start(&engine).await.expect("start");
    state
}

/// Consensus engine that commits every entry locally, optionally after a delay.
#[allow(dead_code)]
pub struct LoopbackEngine {
    state: Arc<PersistentState>,
    next_index: AtomicU64,
    snapshot: Mutex<Option<CommittedEntry>>,
    delayed: Option<mpsc::UnboundedSender<CommittedEntry>>,
    replicated: Mutex<Vec<LogEntry>>,
}

#[allow(dead_code)]
impl LoopbackEngine {
    pub fn new(state: Arc<PersistentState>) -> Self {
        Self {
            state,
            next_index: AtomicU64::new(0),
            snapshot: Mutex::new(None),
            delayed: None,
            replicated: Mutex::new(Vec::new()),
        }
    }

    /// Commit entries in order on a background task, each `delay` after the
    /// previous one, like a remote leader would. Needs a tokio runtime.
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<CommittedEntry>();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(committed) = rx.recv().await {
                tokio::time::sleep(delay).await;
                state.apply(&committed).expect("delayed apply");
            }
        });
        self.delayed = Some(tx);
        self
    }

    /// Snapshot handed out at startup.
    pub fn with_snapshot(self, snapshot: CommittedEntry) -> Self {
        self.next_index.store(snapshot.index, Ordering::SeqCst);
        *self.snapshot.lock() = Some(snapshot);
        self
    }

    /// Every entry submitted so far, in order.
    pub fn replicated(&self) -> Vec<LogEntry> {
        self.replicated.lock().clone()
    }
}

impl ConsensusEngine for LoopbackEngine {
    async fn replicate(&self, entry: LogEntry) -> Result<()> {
        self.replicated.lock().push(entry.clone());
        let index = self.next_index.fetch_add(1, Ordering::SeqCst) + 1;
        let committed = CommittedEntry::new(index, entry);
        match &self.delayed {
            Some(tx) => tx
                .send(committed)
                .map_err(|_| StoreError::replication_error("loopback", "apply task stopped")),
            None => self.state.apply(&committed),
        }
    }

    async fn latest_snapshot(&self) -> Result<Option<CommittedEntry>> {
        Ok(self.snapshot.lock().clone())
    }
}

/// Consensus engine that never answers.
#[allow(dead_code)]
pub struct StalledEngine;

impl ConsensusEngine for StalledEngine {
    async fn replicate(&self, _entry: LogEntry) -> Result<()> {
        std::future::pending().await
    }

    async fn latest_snapshot(&self) -> Result<Option<CommittedEntry>> {
        Ok(None)
    }
}

/// Consensus engine that accepts entries but never commits them on this node.
#[allow(dead_code)]
pub struct DetachedEngine;

impl ConsensusEngine for DetachedEngine {
    async fn replicate(&self, _entry: LogEntry) -> Result<()> {
        Ok(())
    }

    async fn latest_snapshot(&self) -> Result<Option<CommittedEntry>> {
        Ok(None)
    }
}

/// Halt `state` with an undecodable entry at the next index.
#[allow(dead_code)]
pub fn halt(state: &PersistentState) {
    let corrupt = LogEntry::from_bytes(vec![99, 0, 0, 0, 0, 0, 0, 0]);
    let index = state.applied_index() + 1;
    assert!(state.apply(&CommittedEntry::new(index, corrupt)).is_err());
    assert!(state.is_halted());
}

// === proptest strategies ===

fn key() -> impl Strategy<Value = String> {
    prop_oneof![Just("a"), Just("b"), Just("c")].prop_map(str::to_string)
}

fn element_id() -> impl Strategy<Value = String> {
    (0..6u8).prop_map(|i| format!("e{i}"))
}

fn transaction_id() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), (0..4u8).prop_map(|i| format!("tx{i}"))]
}

fn payload() -> impl Strategy<Value = Bytes> {
    proptest::collection::vec(any::<u8>(), 0..16).prop_map(Bytes::from)
}

fn code() -> impl Strategy<Value = i32> {
    prop_oneof![Just(200), Just(500), Just(504), Just(404), Just(1000)]
}

fn tick() -> impl Strategy<Value = i64> {
    0..400i64
}

fn expiry() -> impl Strategy<Value = Option<i64>> {
    proptest::option::of(tick())
}

#[allow(dead_code)]
pub fn push_strategy() -> impl Strategy<Value = PushQueueItem> {
    (
        key(),
        element_id(),
        payload(),
        tick(),
        1..150i64,
        proptest::collection::vec(0..100i64, 0..3),
        proptest::collection::vec(code(), 0..3),
    )
        .prop_map(|(key, id, value, now, timeout, retries, codes)| {
            PushQueueItem::new(key, id, value, now, timeout)
                .retries(retries)
                .retryable_codes(codes)
        })
}

/// Any non-snapshot command over a small key space, so commands collide often.
#[allow(dead_code)]
pub fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        (key(), payload(), expiry()).prop_map(|(key, value, expire_at)| {
            Command::SetKeyValue(SetKeyValue {
                key,
                value,
                expire_at,
            })
        }),
        key().prop_map(|key| Command::from(DeleteKeyValue::new(key))),
        (key(), proptest::collection::btree_map(key(), payload(), 0..3), expiry()).prop_map(
            |(key, fields, expire_at)| {
                let mut command = SetHashset::new(key);
                for (name, value) in fields {
                    command = command.field(name, value);
                }
                command.expire_at = expire_at;
                Command::SetHashset(command)
            }
        ),
        (key(), proptest::option::of(key())).prop_map(|(key, field)| {
            Command::DeleteHashset(DeleteHashset { key, field })
        }),
        push_strategy().prop_map(Command::from),
        proptest::collection::vec(push_strategy(), 0..3)
            .prop_map(|items| Command::PushQueueItemBatch(PushQueueItemBatch { items })),
        (key(), 0..4u32, tick(), transaction_id())
            .prop_map(|(key, count, now, tx)| Command::from(LeaseQueueItems::new(key, count, now, tx))),
        (key(), element_id(), code(), tick())
            .prop_map(|(key, id, code, now)| Command::from(RecordCallback::new(key, id, code, now))),
        (key(), tick(), proptest::collection::vec((element_id(), code()), 0..3)).prop_map(
            |(key, now, outcomes)| {
                Command::RecordCallbackBatch(RecordCallbackBatch {
                    key,
                    now,
                    outcomes: outcomes
                        .into_iter()
                        .map(|(id, code)| CallbackOutcome::new(id, code))
                        .collect(),
                })
            }
        ),
    ]
}
