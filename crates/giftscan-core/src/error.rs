//! Error types for the scan pipeline.

use thiserror::Error;

/// Errors that can occur while scanning and fulfilling intents.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Log decode error: {0}")]
    Decode(String),

    #[error("Notification error: {0}")]
    Notification(String),

    /// A log without an index position belongs to a pending block. The
    /// scanner never requests the unconfirmed tip, so this is a chain
    /// client contract breach and aborts the chunk.
    #[error("Pending log in block {block_number} (tx {tx_hash})")]
    PendingLog { block_number: u64, tx_hash: String },

    /// `start > end` when a scan begins. Chunks are consumed faster than
    /// new blocks are produced, so this is a programming invariant, not a
    /// retryable condition.
    #[error("Invalid scan range: start {start} > end {end}")]
    InvalidRange { start: u64, end: u64 },
}

impl ScanError {
    /// Returns `true` if the error is a chain client contract breach
    /// (a log from an unconfirmed block).
    pub fn is_pending_log(&self) -> bool {
        matches!(self, Self::PendingLog { .. })
    }
}
