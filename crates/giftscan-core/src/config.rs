//! Scanner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// JSON-RPC throttling and scan-window parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// First block the contract could have emitted events at.
    pub genesis_block: u64,
    /// Trailing blocks re-scanned every cycle to absorb shallow reorgs.
    pub reorg_safety_blocks: u64,
    /// Smallest chunk (blocks per `eth_getLogs` call).
    pub min_chunk_size: u64,
    /// Largest chunk the node is asked to serve.
    pub max_chunk_size: u64,
    /// Chunk size for the first request of a scan.
    pub start_chunk_size: u64,
    /// Growth factor applied after a chunk with no events.
    pub chunk_size_increase: f64,
    /// Attempts per log fetch before giving up on the cycle.
    pub max_request_retries: u32,
    /// Fixed sleep between retries (lets the node recover).
    pub request_retry_delay: Duration,
    /// Minimum spacing between mid-cycle checkpoint writes.
    pub checkpoint_save_interval: Duration,
    /// Sleep between scan cycles.
    pub poll_interval: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            genesis_block: 1,
            reorg_safety_blocks: 12,
            min_chunk_size: 5,
            max_chunk_size: 500,
            start_chunk_size: 5,
            chunk_size_increase: 2.0,
            max_request_retries: 10,
            request_retry_delay: Duration::from_secs(3),
            checkpoint_save_interval: Duration::from_secs(60),
            poll_interval: Duration::from_secs(10),
        }
    }
}
