//! Error handling for the raft-store state machine
//!
//! This module provides the error types surfaced by the replicated store: decoding
//! of committed log entries, the persistent-state adapter, the consensus seam and
//! configuration loading.
//!
//! # Error Design Philosophy
//!
//! ## 1. Error Categories
//! - **Codec Errors**: Malformed or truncated command bytes
//! - **Adapter Errors**: Node not started, halted after a corrupt entry, bad snapshot
//! - **Replication Errors**: Failures reported by the consensus engine
//! - **Configuration Errors**: Invalid settings and initialization problems
//!
//! ## 2. Error Recovery
//! - **Transient**: Retry with backoff (replication failures, timeouts)
//! - **Fatal**: Requires resynchronization from a trusted snapshot (decode failures)
//!
//! Semantic no-ops (deleting an absent key, popping an empty queue, a callback for an
//! unknown element) are never errors; the interpreter returns the state unchanged.
//!
//! # Usage Example
//!
//! ```rust
//! use raft_store::error::{StoreError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(StoreError::NotReady {
//!         operation: "apply".to_string(),
//!         reason: "startup snapshot not installed".to_string(),
//!     })
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;

/// Error type for raft-store operations
#[derive(Error, Debug)]
pub enum StoreError {
    // === Adapter Errors ===

    /// A committed entry could not be decoded; the node must stop applying
    #[error("Failed to decode entry {index} during '{operation}': {source}")]
    Decode {
        /// The operation that was decoding
        operation: String,
        /// Log index of the offending entry (0 when not from the log)
        index: u64,
        /// The underlying codec failure
        #[source]
        source: CodecError,
    },

    /// The adapter refused a request because it halted on a corrupt entry
    #[error("State is halted at index {applied_index}, resynchronize from a snapshot")]
    Halted {
        /// Last successfully applied log index
        applied_index: u64,
    },

    /// The adapter has not finished startup yet
    #[error("Store not ready for operation '{operation}': {reason}")]
    NotReady {
        /// The operation that was attempted
        operation: String,
        /// Why the store is not ready
        reason: String,
    },

    /// Snapshot installation or creation failed
    #[error("Snapshot {operation} failed: {details}")]
    Snapshot {
        /// The snapshot operation that failed (install, build)
        operation: String,
        /// Additional details about the failure
        details: String,
    },

    /// Log entries were delivered out of order
    #[error("Out of order entry: index {index} after {applied_index}")]
    OutOfOrder {
        /// The index that was delivered
        index: u64,
        /// The last applied index
        applied_index: u64,
    },

    // === Replication Errors ===

    /// The consensus engine failed to replicate an entry
    #[error("Replication of '{operation}' failed: {details}")]
    Replication {
        /// The command being replicated
        operation: String,
        /// Details reported by the engine
        details: String,
    },

    /// Operation timed out
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// How long the operation waited before timing out
        duration: Duration,
    },

    // === Configuration Errors ===

    /// Configuration loading failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for raft-store operations
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Check if this error is transient and the operation may be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Replication { .. } | StoreError::Timeout { .. } | StoreError::NotReady { .. }
        )
    }

    /// Check if the node must be resynchronized from a snapshot before serving again
    pub fn requires_resync(&self) -> bool {
        matches!(self, StoreError::Decode { .. } | StoreError::Halted { .. })
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            StoreError::Decode { .. } => "codec",
            StoreError::Halted { .. }
            | StoreError::NotReady { .. }
            | StoreError::OutOfOrder { .. } => "adapter",
            StoreError::Snapshot { .. } => "snapshot",
            StoreError::Replication { .. } | StoreError::Timeout { .. } => "replication",
            StoreError::Config(_) => "configuration",
        }
    }

    /// Create a decode error for a log entry
    pub fn decode_error(operation: &str, index: u64, source: CodecError) -> Self {
        StoreError::Decode {
            operation: operation.to_string(),
            index,
            source,
        }
    }

    /// Create a replication error
    pub fn replication_error(operation: &str, details: impl Into<String>) -> Self {
        StoreError::Replication {
            operation: operation.to_string(),
            details: details.into(),
        }
    }

    /// Create a snapshot error
    pub fn snapshot_error(operation: &str, details: impl Into<String>) -> Self {
        StoreError::Snapshot {
            operation: operation.to_string(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let decode = StoreError::decode_error("apply", 7, CodecError::Truncated { needed: 4, remaining: 1 });
        assert_eq!(decode.category(), "codec");
        assert!(decode.requires_resync());
        assert!(!decode.is_transient());

        let halted = StoreError::Halted { applied_index: 3 };
        assert_eq!(halted.category(), "adapter");
        assert!(halted.requires_resync());

        let replication = StoreError::replication_error("PushQueueItem", "no leader");
        assert_eq!(replication.category(), "replication");
        assert!(replication.is_transient());

        let timeout = StoreError::Timeout {
            operation: "replicate".to_string(),
            duration: Duration::from_secs(1),
        };
        assert!(timeout.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::decode_error("apply", 12, CodecError::TrailingBytes { remaining: 3 });
        let message = err.to_string();
        assert!(message.contains("entry 12"));
        assert!(message.contains("apply"));

        let err = StoreError::snapshot_error("install", "entry is not a snapshot");
        assert_eq!(err.to_string(), "Snapshot install failed: entry is not a snapshot");
    }
}
