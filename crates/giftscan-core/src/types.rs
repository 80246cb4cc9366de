//! Shared types for the scan pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── EventKey ────────────────────────────────────────────────────────────────

/// The unique address of one observed event:
/// `(block number, transaction hash, log index)`.
///
/// One transaction may contain multiple events if executed by a smart
/// contract; each one gets its own log index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u32,
}

impl EventKey {
    pub fn new(block_number: u64, tx_hash: impl Into<String>, log_index: u32) -> Self {
        Self {
            block_number,
            tx_hash: tx_hash.into(),
            log_index,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.block_number, self.tx_hash, self.log_index)
    }
}

// ─── PresentIntentEvent ──────────────────────────────────────────────────────

/// Decoded arguments of the contract's `PresentIntent` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentIntentArgs {
    /// Token being converted.
    pub token_id: u64,
    /// Token id within its level; matches the intent's `nft_id`.
    pub token_id_in_level: u64,
    /// The redemption intent this conversion fulfills.
    pub present_intent_id: u64,
    /// Collection level; matches the intent's `category_id`.
    pub level: u64,
}

/// A decoded `PresentIntent` log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentIntentEvent {
    /// Block that contains the log.
    pub block_number: u64,
    /// Transaction hash (`0x…`).
    pub tx_hash: String,
    /// Log index within the block; `None` while the block is pending.
    pub log_index: Option<u32>,
    /// Decoded event arguments.
    pub args: PresentIntentArgs,
}

// ─── EventFilter ─────────────────────────────────────────────────────────────

/// Filter for which logs to fetch from the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Contract address the event is emitted from.
    pub address: String,
    /// Event signature hash (topic0).
    pub topic0: String,
}

impl EventFilter {
    pub fn new(address: impl Into<String>, topic0: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            topic0: topic0.into(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
