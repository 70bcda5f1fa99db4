//! Client helpers for submitting commands.
//!
//! [`StoreClient`] turns calls into commands, hands them to the consensus
//! engine and, for pops, polls the local state until the granted lease becomes
//! visible. Replication and local application are not synchronous with each
//! other, hence the bounded polling loop with doubling backoff.

use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::{
    CallbackOutcome, Command, DeleteHashset, DeleteKeyValue, LeaseQueueItems, LogEntry,
    PushQueueItem, PushQueueItemBatch, RecordCallback, RecordCallbackBatch, SetHashset,
    SetKeyValue,
};
use crate::config::ClientConfig;
use crate::error::{Result, StoreError};
use crate::queue::{leased_by, LeasedElement};
use crate::raft::{ConsensusEngine, PersistentState};
use crate::types::Tick;

/// Result of a pop: the transaction that owns the lease and what it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub transaction_id: String,
    pub elements: Vec<LeasedElement>,
}

/// Submits commands through a consensus engine and reads the local state.
pub struct StoreClient<E> {
    engine: Arc<E>,
    state: Arc<PersistentState>,
    config: ClientConfig,
}

impl<E: ConsensusEngine> StoreClient<E> {
    pub fn new(engine: Arc<E>, state: Arc<PersistentState>, config: ClientConfig) -> Self {
        Self {
            engine,
            state,
            config,
        }
    }

    /// Local read-only state.
    pub fn state(&self) -> &Arc<PersistentState> {
        &self.state
    }

    /// Frame and replicate a command, bounded by the replicate timeout.
    pub async fn replicate(&self, command: Command) -> Result<()> {
        let name = command.name();
        let entry = LogEntry::from_command(&command)
            .map_err(|e| StoreError::replication_error(name, e.to_string()))?;
        debug!(command = name, bytes = entry.len(), "replicating");

        match timeout(self.config.replicate_timeout, self.engine.replicate(entry)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation: format!("replicate {name}"),
                duration: self.config.replicate_timeout,
            }),
        }
    }

    pub async fn set_key_value(&self, key: &str, value: Bytes, expire_at: Option<Tick>) -> Result<()> {
        let mut command = SetKeyValue::new(key, value);
        command.expire_at = expire_at;
        self.replicate(command.into()).await
    }

    pub async fn delete_key_value(&self, key: &str) -> Result<()> {
        self.replicate(DeleteKeyValue::new(key).into()).await
    }

    pub async fn set_hashset(&self, command: SetHashset) -> Result<()> {
        self.replicate(command.into()).await
    }

    pub async fn delete_hashset(&self, key: &str, field: Option<&str>) -> Result<()> {
        let command = match field {
            Some(field) => DeleteHashset::field(key, field),
            None => DeleteHashset::new(key),
        };
        self.replicate(command.into()).await
    }

    pub async fn push(&self, item: PushQueueItem) -> Result<()> {
        self.replicate(item.into()).await
    }

    pub async fn push_batch(&self, items: Vec<PushQueueItem>) -> Result<()> {
        self.replicate(PushQueueItemBatch { items }.into()).await
    }

    /// Lease up to `count` elements under a fresh transaction id.
    pub async fn pop(&self, key: &str, count: u32, now: Tick) -> Result<Lease> {
        let transaction_id = Uuid::new_v4().to_string();
        self.pop_with_transaction(key, count, now, &transaction_id).await
    }

    /// Lease under a caller-chosen transaction id. Retrying with the same id
    /// after a failed or timed-out call recovers the original lease instead
    /// of taking new elements.
    pub async fn pop_with_transaction(
        &self,
        key: &str,
        count: u32,
        now: Tick,
        transaction_id: &str,
    ) -> Result<Lease> {
        self.replicate(LeaseQueueItems::new(key, count, now, transaction_id).into())
            .await?;

        let mut backoff = self.config.pop_initial_backoff;
        let mut unreadable = None;
        for attempt in 1..=self.config.pop_poll_attempts {
            // a halted node may be resynchronized while we wait
            match self.state.invoke() {
                Ok(state) => {
                    unreadable = None;
                    let elements = leased_by(&state.queue(key), transaction_id, now);
                    if !elements.is_empty() {
                        debug!(queue = key, transaction = transaction_id, attempt, leased = elements.len(), "lease visible");
                        return Ok(Lease {
                            transaction_id: transaction_id.to_string(),
                            elements,
                        });
                    }
                }
                Err(e) => {
                    warn!(queue = key, transaction = transaction_id, attempt, error = %e, "state unreadable, backing off");
                    unreadable = Some(e);
                }
            }
            if attempt < self.config.pop_poll_attempts {
                sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.pop_max_backoff);
            }
        }

        if let Some(e) = unreadable {
            return Err(e);
        }
        warn!(queue = key, transaction = transaction_id, "no lease visible after polling");
        Ok(Lease {
            transaction_id: transaction_id.to_string(),
            elements: Vec::new(),
        })
    }

    /// Report the outcome of one leased element.
    pub async fn callback(&self, key: &str, element_id: &str, code: i32, now: Tick) -> Result<()> {
        self.replicate(RecordCallback::new(key, element_id, code, now).into())
            .await
    }

    /// Report several outcomes at once.
    pub async fn callback_batch(&self, key: &str, outcomes: Vec<CallbackOutcome>, now: Tick) -> Result<()> {
        self.replicate(
            RecordCallbackBatch {
                key: key.to_string(),
                now,
                outcomes,
            }
            .into(),
        )
        .await
    }
}
