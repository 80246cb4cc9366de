//! Chain client contract and raw log decoding.
//!
//! The engine is strictly read-only against the node: latest head, block
//! timestamps, and `eth_getLogs` over a bounded range. All calls must be
//! safe to repeat with the same arguments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use giftscan_core::{EventFilter, PresentIntentArgs, PresentIntentEvent, ScanError};

/// Read-only access to the ledger node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head height.
    async fn latest_block_number(&self) -> Result<u64, ScanError>;

    /// Mined timestamp of a block. `Ok(None)` means the block was not
    /// found — not mined yet, or gone in a minor reorganisation. That is a
    /// recoverable absence, not an error.
    async fn block_timestamp(&self, block_number: u64)
        -> Result<Option<DateTime<Utc>>, ScanError>;

    /// Fetch logs matching `filter` in `[from_block, to_block]`, ordered
    /// as returned by the node. Idempotent.
    async fn get_logs(
        &self,
        filter: &EventFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ScanError>;
}

// ─── RawLog ──────────────────────────────────────────────────────────────────

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    /// Null while the containing block is pending.
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    pub fn block_number_u64(&self) -> Result<u64, ScanError> {
        parse_hex_u64(&self.block_number)
    }

    /// Log index within the block; `None` when the node reports the log
    /// as pending.
    pub fn log_index_u32(&self) -> Result<Option<u32>, ScanError> {
        match &self.log_index {
            Some(index) => Ok(Some(parse_hex_u64(index)? as u32)),
            None => Ok(None),
        }
    }

    /// Returns `true` if this log was dropped by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, ScanError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ScanError::Decode(format!("bad hex quantity {s:?}: {e}")))
}

// ─── PresentIntent decoding ──────────────────────────────────────────────────

/// Decode a raw log into a `PresentIntent` event.
///
/// The event carries four non-indexed uint256 words in `data`:
/// `tokenId`, `tokenIdInLevel`, `presentIntentId`, `level`.
pub fn decode_present_intent(log: &RawLog) -> Result<PresentIntentEvent, ScanError> {
    Ok(PresentIntentEvent {
        block_number: log.block_number_u64()?,
        tx_hash: log.tx_hash.clone(),
        log_index: log.log_index_u32()?,
        args: PresentIntentArgs {
            token_id: decode_word(&log.data, 0)?,
            token_id_in_level: decode_word(&log.data, 1)?,
            present_intent_id: decode_word(&log.data, 2)?,
            level: decode_word(&log.data, 3)?,
        },
    })
}

/// Extract the `index`-th 32-byte ABI word from `data` as u64.
fn decode_word(data: &str, index: usize) -> Result<u64, ScanError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    let start = index * 64;
    let word = digits.get(start..start + 64).ok_or_else(|| {
        ScanError::Decode(format!(
            "log data truncated: word {index} missing ({} hex chars)",
            digits.len()
        ))
    })?;

    let (high, low) = word.split_at(48);
    if high.bytes().any(|b| b != b'0') {
        return Err(ScanError::Decode(format!(
            "word {index} overflows u64: 0x{word}"
        )));
    }
    u64::from_str_radix(low, 16)
        .map_err(|e| ScanError::Decode(format!("bad word {index} in log data: {e}")))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
