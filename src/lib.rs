//! # raft-store
//!
//! The replicated data core of a serverless platform: a small key-value,
//! hashset and work-queue store whose mutations are applied identically on
//! every node through a replicated command log.
//!
//! - **Command catalog** with a compact, length-exact binary codec
//! - **Queue lease protocol** with visibility timeouts, retry schedules and
//!   idempotent pops
//! - **Deterministic interpreter** over persistent (`im`) collections
//! - **Snapshot builder** for log compaction
//! - **Persistent-state adapter** with lock-free reads for the rest of the platform
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use raft_store::command::{LeaseQueueItems, PushQueueItem};
//! use raft_store::queue::leased_by;
//! use raft_store::raft::replay;
//! use raft_store::types::State;
//!
//! let state = replay(
//!     &State::new(),
//!     &[
//!         PushQueueItem::new("fn-a", "req-1", Bytes::from_static(b"{}"), 0, 100).into(),
//!         LeaseQueueItems::new("fn-a", 1, 5, "tx-1").into(),
//!     ],
//! );
//!
//! let leased = leased_by(&state.queue("fn-a"), "tx-1", 5);
//! assert_eq!(leased[0].id, "req-1");
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod expiration;
pub mod logging;
pub mod queue;
pub mod raft;
pub mod types;

// Public API exports
pub use crate::client::{Lease, StoreClient};
pub use crate::command::{Command, CommandTag, LogEntry};
pub use crate::config::{Config, ConfigBuilder, ConfigError, ConfigResult};
pub use crate::error::{Result, StoreError};
pub use crate::queue::{ElementStatus, LeasedElement};
pub use crate::raft::{CommittedEntry, ConsensusEngine, PersistentState, SnapshotBuilder};
pub use crate::types::{QueueAttempt, QueueElement, State, Tick};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::command::*;
    pub use crate::config::{Config, ConfigBuilder, ConfigError, ConfigResult};
    pub use crate::error::{Result, StoreError};
    pub use crate::queue::{count_elements, leased_by, status, ElementStatus, LeasedElement};
    pub use crate::raft::{apply, replay, CommittedEntry, ConsensusEngine, PersistentState};
    pub use crate::types::*;
}
