//! Checkpoint state — durable record of scan progress and observed events.
//!
//! One checkpoint document exists per deployment. It stores the highest
//! fully-scanned block and every event observed so far, keyed by
//! `(block number, tx hash, log index)`. On restart the scanner resumes
//! from the checkpoint instead of re-scanning from genesis.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ScanError;
use crate::types::{EventKey, PresentIntentEvent};

/// One observed `PresentIntent` conversion. Created once per log and
/// immutable thereafter; only a reorg rollback can remove it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub token_id: u64,
    pub token_id_in_level: u64,
    pub present_intent_id: u64,
    pub level: u64,
    /// Mined timestamp of the containing block; `None` when the block
    /// lookup hit a very shallow, self-correcting reorg.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Events of one block: tx hash → log index → record.
pub type BlockEvents = HashMap<String, BTreeMap<u32, EventRecord>>;

/// The singleton checkpoint document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Highest block that has been fully scanned.
    pub last_scanned_block: u64,
    /// All observed events, grouped by block number.
    pub blocks: BTreeMap<u64, BlockEvents>,
}

/// Trait for loading and persisting the singleton checkpoint document.
///
/// Implementations include `MemoryStore` and `SqliteStorage` in
/// `giftscan-storage`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint document (`None` if nothing was ever saved).
    async fn load(&self) -> Result<Option<Checkpoint>, ScanError>;

    /// Save (upsert) the checkpoint document.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ScanError>;
}

/// Owns the in-memory checkpoint and decides when to persist it.
///
/// `end_chunk` persists at most once per `save_interval` to bound write
/// amplification from frequent small chunks; `save` persists
/// unconditionally at the end of a full scan cycle.
pub struct ScannerState {
    store: Arc<dyn CheckpointStore>,
    checkpoint: Checkpoint,
    save_interval: Duration,
    last_save: Option<Instant>,
}

impl ScannerState {
    pub fn new(store: Arc<dyn CheckpointStore>, save_interval: Duration) -> Self {
        Self {
            store,
            checkpoint: Checkpoint::default(),
            save_interval,
            last_save: None,
        }
    }

    /// Restore the last scan state, or start from scratch if none exists.
    pub async fn restore(&mut self) -> Result<(), ScanError> {
        match self.store.load().await? {
            Some(checkpoint) => {
                info!(
                    last_scanned_block = checkpoint.last_scanned_block,
                    "restored scanner state"
                );
                self.checkpoint = checkpoint;
            }
            None => {
                info!("no saved state, starting from scratch");
                self.checkpoint = Checkpoint::default();
            }
        }
        Ok(())
    }

    /// Persist everything scanned so far, unconditionally.
    pub async fn save(&mut self) -> Result<(), ScanError> {
        self.store.save(&self.checkpoint).await?;
        self.last_save = Some(Instant::now());
        debug!(
            last_scanned_block = self.checkpoint.last_scanned_block,
            "checkpoint saved"
        );
        Ok(())
    }

    /// The number of the last block we have fully scanned.
    pub fn last_scanned_block(&self) -> u64 {
        self.checkpoint.last_scanned_block
    }

    /// Remove potentially reorganised blocks from the scan data.
    ///
    /// Drops every block entry with number ≥ `since_block`. Downstream
    /// intent status is deliberately untouched: a reorg can only erase
    /// ledger observations, never already-completed fulfillment.
    pub fn delete_forked_data(&mut self, since_block: u64) {
        let removed = self.checkpoint.blocks.split_off(&since_block);
        if !removed.is_empty() {
            info!(
                since_block,
                blocks = removed.len(),
                "purged potentially forked block data"
            );
        }
    }

    /// Mark a chunk as fully scanned up to `block_number`.
    ///
    /// Persists only if more than `save_interval` has elapsed since the
    /// last persist, so a crash mid-cycle loses at most one interval of
    /// progress (and rescans are idempotent downstream).
    pub async fn end_chunk(&mut self, block_number: u64) -> Result<(), ScanError> {
        self.checkpoint.last_scanned_block = block_number;
        let due = self
            .last_save
            .map_or(true, |at| at.elapsed() > self.save_interval);
        if due {
            self.save().await?;
        }
        Ok(())
    }

    /// Store the event record under its composite key.
    ///
    /// Pure state mutation; fulfillment dispatch is a separate stage owned
    /// by the event processor.
    pub fn record_event(
        &mut self,
        block_when: Option<DateTime<Utc>>,
        event: &PresentIntentEvent,
        log_index: u32,
    ) -> EventKey {
        let record = EventRecord {
            token_id: event.args.token_id,
            token_id_in_level: event.args.token_id_in_level,
            present_intent_id: event.args.present_intent_id,
            level: event.args.level,
            timestamp: block_when,
        };

        self.checkpoint
            .blocks
            .entry(event.block_number)
            .or_default()
            .entry(event.tx_hash.clone())
            .or_default()
            .insert(log_index, record);

        EventKey::new(event.block_number, event.tx_hash.clone(), log_index)
    }

    /// Look up a stored record by composite key.
    pub fn get_record(&self, key: &EventKey) -> Option<&EventRecord> {
        self.checkpoint
            .blocks
            .get(&key.block_number)?
            .get(&key.tx_hash)?
            .get(&key.log_index)
    }

    /// Total number of stored event records.
    pub fn record_count(&self) -> usize {
        self.checkpoint
            .blocks
            .values()
            .flat_map(|txs| txs.values())
            .map(|logs| logs.len())
            .sum()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
