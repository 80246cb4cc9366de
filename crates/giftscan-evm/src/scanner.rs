//! The scan coordinator — chunked, adaptive, crash-resumable log scanning.
//!
//! Scans the block range in chunks, committing checkpoint progress between
//! chunks. The chunk size adapts to event density: it resets to the
//! configured minimum as soon as a chunk yields events (events cluster, so
//! scan conservatively near activity) and grows geometrically through
//! quiet ranges. Failed log fetches are retried with a halved block range
//! on the assumption that the node rejected a too-wide request or is
//! transiently overloaded.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use giftscan_core::{
    EventFilter, EventKey, EventProcessor, ScanError, ScannerConfig, ScannerState,
};

use crate::client::{decode_present_intent, ChainClient};

/// Per-chunk cache of block mined timestamps: one lookup per distinct
/// block number, not per event. Dropped with the chunk; no shared mutable
/// state escapes.
#[derive(Default)]
pub struct BlockTimestampCache {
    timestamps: HashMap<u64, Option<DateTime<Utc>>>,
}

impl BlockTimestampCache {
    pub async fn get<C: ChainClient>(
        &mut self,
        client: &C,
        block_number: u64,
    ) -> Result<Option<DateTime<Utc>>, ScanError> {
        if let Some(cached) = self.timestamps.get(&block_number) {
            return Ok(*cached);
        }
        let when = client.block_timestamp(block_number).await?;
        self.timestamps.insert(block_number, when);
        Ok(when)
    }
}

/// Scans the chain for monitored events and hands them to the processor.
pub struct Scanner<C: ChainClient> {
    client: C,
    filters: Vec<EventFilter>,
    config: ScannerConfig,
}

impl<C: ChainClient> Scanner<C> {
    /// `filters` holds one entry per monitored event type.
    pub fn new(client: C, filters: Vec<EventFilter>, config: ScannerConfig) -> Self {
        Self {
            client,
            filters,
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Where the next scan cycle should start: re-scan the trailing reorg
    /// safety window, clamped to the contract's genesis block.
    pub fn suggested_start_block(&self, last_scanned_block: u64) -> u64 {
        last_scanned_block
            .saturating_sub(self.config.reorg_safety_blocks)
            .max(self.config.genesis_block)
    }

    /// The last block a scan may cover: one behind the head, because the
    /// tip might not be finalized by the node yet.
    pub async fn suggested_end_block(&self) -> Result<u64, ScanError> {
        Ok(self.client.latest_block_number().await?.saturating_sub(1))
    }

    /// Next chunk size given how many events the previous chunk yielded.
    pub fn estimate_next_chunk_size(&self, current_chunk_size: u64, events_found: usize) -> u64 {
        let next = if events_found > 0 {
            // First hits: reset the window and scan conservatively.
            self.config.min_chunk_size
        } else {
            (current_chunk_size as f64 * self.config.chunk_size_increase) as u64
        };
        next.clamp(self.config.min_chunk_size, self.config.max_chunk_size)
    }

    /// Perform a chunked scan of `[start_block, end_block]`.
    ///
    /// Returns the composite keys of all processed events and the number
    /// of chunks used. The checkpoint is advanced after every chunk, so a
    /// crash resumes from the last committed chunk.
    pub async fn scan(
        &self,
        state: &mut ScannerState,
        processor: &EventProcessor,
        start_block: u64,
        end_block: u64,
        start_chunk_size: u64,
    ) -> Result<(Vec<EventKey>, u64), ScanError> {
        if start_block > end_block {
            // Chunks are consumed faster than new blocks are produced.
            return Err(ScanError::InvalidRange {
                start: start_block,
                end: end_block,
            });
        }

        let mut current_block = start_block;
        let mut chunk_size = start_chunk_size;
        let mut total_chunks_scanned = 0u64;
        let mut all_processed = Vec::new();

        while current_block <= end_block {
            let estimated_end_block = (current_block + chunk_size).min(end_block);
            debug!(
                from = current_block,
                to = estimated_end_block,
                chunk_size,
                "scanning chunk"
            );

            let (actual_end_block, new_entries) = self
                .scan_chunk(state, processor, current_block, estimated_end_block)
                .await?;

            chunk_size = self.estimate_next_chunk_size(chunk_size, new_entries.len());
            current_block = actual_end_block + 1;
            total_chunks_scanned += 1;
            state.end_chunk(actual_end_block).await?;
            all_processed.extend(new_entries);
        }

        Ok((all_processed, total_chunks_scanned))
    }

    /// Read and process events in `[start_block, end_block]`.
    ///
    /// The retry policy may shrink the range; the actual end block scanned
    /// is returned so the caller advances from the right place.
    async fn scan_chunk(
        &self,
        state: &mut ScannerState,
        processor: &EventProcessor,
        start_block: u64,
        end_block: u64,
    ) -> Result<(u64, Vec<EventKey>), ScanError> {
        let mut cache = BlockTimestampCache::default();
        let mut chunk_end = end_block;
        let mut processed = Vec::new();

        for filter in &self.filters {
            let (actual_end, logs) = self
                .fetch_logs_with_retry(filter, start_block, chunk_end)
                .await?;
            chunk_end = actual_end;

            for log in &logs {
                if log.is_removed() {
                    continue;
                }
                let event = decode_present_intent(log)?;

                // We cannot avoid minor reorganisations, but we must never
                // see logs from blocks that are not mined yet.
                let Some(log_index) = event.log_index else {
                    return Err(ScanError::PendingLog {
                        block_number: event.block_number,
                        tx_hash: event.tx_hash,
                    });
                };

                // Idempotency guard against log replay after a crash.
                if processor.is_completed(event.args.present_intent_id).await? {
                    continue;
                }

                let block_when = cache.get(&self.client, event.block_number).await?;

                debug!(
                    block = event.block_number,
                    intent = event.args.present_intent_id,
                    "processing PresentIntent event"
                );
                let key = state.record_event(block_when, &event, log_index);
                processor.fulfill(&event.args).await?;
                processed.push(key);
            }
        }

        Ok((chunk_end, processed))
    }

    /// Fetch logs with up to `max_request_retries` attempts, halving the
    /// block range on each failure and sleeping a fixed delay so the node
    /// can recover. Returns the end block actually served.
    async fn fetch_logs_with_retry(
        &self,
        filter: &EventFilter,
        start_block: u64,
        end_block: u64,
    ) -> Result<(u64, Vec<crate::client::RawLog>), ScanError> {
        let retries = self.config.max_request_retries.max(1);
        let mut end = end_block;
        let mut attempt = 0;

        loop {
            match self.client.get_logs(filter, start_block, end).await {
                Ok(logs) => return Ok((end, logs)),
                Err(err) => {
                    attempt += 1;
                    if attempt >= retries {
                        warn!(start_block, end, "out of log fetch retries");
                        return Err(err);
                    }
                    warn!(
                        start_block,
                        end,
                        width = end - start_block,
                        error = %err,
                        "log fetch failed, halving block range and retrying"
                    );
                    end = start_block + (end - start_block) / 2;
                    tokio::time::sleep(self.config.request_retry_delay).await;
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
