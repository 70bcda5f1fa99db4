//! Replicated state machine for raft-store
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  client            consensus engine          this module         │
//! │  ┌───────────┐     ┌────────────────┐     ┌───────────────────┐  │
//! │  │ Command   │────▶│ replicate()    │────▶│ PersistentState   │  │
//! │  │ LogEntry  │     │ (ordering,     │     │ • apply()         │  │
//! │  └───────────┘     │  durability)   │     │ • invoke()        │  │
//! │        ▲           └────────────────┘     └─────────┬─────────┘  │
//! │        │                                            │            │
//! │        │  poll invoke()           ┌─────────────────▼─────────┐  │
//! │        └──────────────────────────│ interpreter::apply        │  │
//! │                                   │ SnapshotBuilder (scratch) │  │
//! │                                   └───────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### 1. Interpreter (`interpreter`)
//! Pure `apply(&State, &Command) -> State` with one handler per command.
//!
//! ### 2. Snapshot Builder (`snapshot_builder`)
//! Replays every applied command into a scratch state and emits a
//! `Snapshot` command when the log should be compacted.
//!
//! ### 3. Persistent State (`persistent_state`)
//! Receives committed entries from the engine, swaps the shared state
//! atomically and serves lock-free reads.
//!
//! ### 4. Consensus Seam (`consensus`)
//! The [`ConsensusEngine`] trait implemented by the replication layer.
//!
//! ## Determinism
//!
//! Commands carry their own ticks and every collection is ordered, so two
//! replicas applying the same log produce identical states and identical
//! snapshot bytes.

pub mod consensus;
pub mod interpreter;
pub mod persistent_state;
pub mod snapshot_builder;

pub use consensus::{CommittedEntry, ConsensusEngine};
pub use interpreter::{apply, replay};
pub use persistent_state::PersistentState;
pub use snapshot_builder::SnapshotBuilder;
