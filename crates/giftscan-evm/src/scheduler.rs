//! The outer scheduler loop.
//!
//! Each cycle: restore the checkpoint, roll back the reorg safety window,
//! compute the block window, scan, force-save, sleep. Errors anywhere in a
//! cycle are logged and the loop continues — the ingestion service never
//! terminates on a transient failure.

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use giftscan_core::{EventProcessor, ScanError, ScannerState};

use crate::client::ChainClient;
use crate::scanner::Scanner;

/// Result of one completed scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub start_block: u64,
    pub end_block: u64,
    pub events_processed: usize,
    pub chunks_scanned: u64,
    pub duration: Duration,
}

pub struct Scheduler<C: ChainClient> {
    scanner: Scanner<C>,
    state: ScannerState,
    processor: EventProcessor,
}

impl<C: ChainClient> Scheduler<C> {
    pub fn new(scanner: Scanner<C>, state: ScannerState, processor: EventProcessor) -> Self {
        Self {
            scanner,
            state,
            processor,
        }
    }

    /// Run scan cycles forever, sleeping `poll_interval` between cycles.
    pub async fn run(&mut self) {
        let poll_interval = self.scanner.config().poll_interval;
        loop {
            if let Err(err) = self.run_cycle().await {
                error!(error = %err, "scan cycle failed");
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute a single scan cycle.
    ///
    /// Returns `Ok(None)` when the chain head is not far enough ahead to
    /// open a scan window.
    pub async fn run_cycle(&mut self) -> Result<Option<CycleSummary>, ScanError> {
        self.state.restore().await?;

        // Anything inside the trailing safety window may have been
        // reorganised away since the last cycle; drop and re-scan it.
        let last_scanned = self.state.last_scanned_block();
        let reorg_safety = self.scanner.config().reorg_safety_blocks;
        self.state
            .delete_forked_data(last_scanned.saturating_sub(reorg_safety));

        let start_block = self.scanner.suggested_start_block(last_scanned);
        let end_block = self.scanner.suggested_end_block().await?;
        if end_block < start_block {
            debug!(start_block, end_block, "chain head not far enough ahead, skipping cycle");
            return Ok(None);
        }

        info!(start_block, end_block, "scanning for PresentIntent events");
        let started = Instant::now();

        let (processed, chunks_scanned) = self
            .scanner
            .scan(
                &mut self.state,
                &self.processor,
                start_block,
                end_block,
                self.scanner.config().start_chunk_size,
            )
            .await?;

        // Progress must survive a crash right after the cycle.
        self.state.save().await?;

        let summary = CycleSummary {
            start_block,
            end_block,
            events_processed: processed.len(),
            chunks_scanned,
            duration: started.elapsed(),
        };
        info!(
            events = summary.events_processed,
            chunks = summary.chunks_scanned,
            duration_ms = summary.duration.as_millis() as u64,
            "scan cycle complete"
        );
        Ok(Some(summary))
    }

    pub fn state(&self) -> &ScannerState {
        &self.state
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RawLog;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use giftscan_core::{
        EventFilter, IntentRequest, IntentStatus, NotificationSender, ScannerConfig,
    };
    use giftscan_storage::memory::{MemoryNotifier, MemoryStore};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct MockChain {
        head: u64,
        logs: BTreeMap<u64, Vec<RawLog>>,
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn latest_block_number(&self) -> Result<u64, ScanError> {
            Ok(self.head)
        }

        async fn block_timestamp(
            &self,
            block_number: u64,
        ) -> Result<Option<DateTime<Utc>>, ScanError> {
            Ok(Utc.timestamp_opt(block_number as i64 * 12, 0).single())
        }

        async fn get_logs(
            &self,
            _filter: &EventFilter,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<RawLog>, ScanError> {
            Ok(self
                .logs
                .range(from_block..=to_block)
                .flat_map(|(_, logs)| logs.clone())
                .collect())
        }
    }

    fn present_intent_log(block: u64, intent: u64) -> RawLog {
        RawLog {
            address: "0xc0ffee".into(),
            topics: vec!["0xtopic0".into()],
            data: format!("0x{:064x}{:064x}{:064x}{:064x}", 100u64, 42u64, intent, 2u64),
            block_number: format!("0x{block:x}"),
            tx_hash: format!("0xtx{block:x}"),
            log_index: Some("0x0".into()),
            removed: None,
        }
    }

    fn test_config() -> ScannerConfig {
        ScannerConfig {
            request_retry_delay: Duration::ZERO,
            checkpoint_save_interval: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..ScannerConfig::default()
        }
    }

    fn scheduler(
        chain: MockChain,
        checkpoints: Arc<MemoryStore>,
        intents: Arc<MemoryStore>,
        notifier: Arc<MemoryNotifier>,
    ) -> Scheduler<MockChain> {
        let config = test_config();
        let state = ScannerState::new(checkpoints, config.checkpoint_save_interval);
        let scanner = Scanner::new(
            chain,
            vec![EventFilter::new("0xc0ffee", "0xtopic0")],
            config,
        );
        let processor = EventProcessor::new(
            intents,
            notifier,
            NotificationSender::new("nft_conversion", Default::default()),
        );
        Scheduler::new(scanner, state, processor)
    }

    fn seed_intent(store: &MemoryStore, intent_id: u64) {
        store.insert_intent(IntentRequest {
            intent_id,
            category_id: "2".into(),
            nft_id: "42".into(),
            phone: "+15550100".into(),
            status: IntentStatus::Pending,
            requested_at: Utc::now(),
        });
    }

    #[tokio::test]
    async fn cycle_window_rescans_the_safety_window() {
        // Head 100, safety 12, checkpoint at 50 → window [38, 99].
        let store = Arc::new(MemoryStore::new());
        {
            let mut state = ScannerState::new(store.clone(), Duration::ZERO);
            state.end_chunk(50).await.unwrap();
        }

        let chain = MockChain {
            head: 100,
            ..Default::default()
        };
        let notifier = Arc::new(MemoryNotifier::new());
        let mut sched = scheduler(chain, store.clone(), Arc::new(MemoryStore::new()), notifier);

        let summary = sched.run_cycle().await.unwrap().unwrap();
        assert_eq!(summary.start_block, 38);
        assert_eq!(summary.end_block, 99);
        assert_eq!(sched.state().last_scanned_block(), 99);
    }

    #[tokio::test]
    async fn cycle_is_skipped_when_head_is_behind_the_checkpoint() {
        let store = Arc::new(MemoryStore::new());
        {
            let mut state = ScannerState::new(store.clone(), Duration::ZERO);
            state.end_chunk(500).await.unwrap();
        }

        let chain = MockChain {
            head: 100, // head − 1 = 99 < start 488
            ..Default::default()
        };
        let notifier = Arc::new(MemoryNotifier::new());
        let mut sched = scheduler(chain, store, Arc::new(MemoryStore::new()), notifier);

        assert_eq!(sched.run_cycle().await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_delivery_across_restart_notifies_once() {
        // A PresentIntent log for intent 7 is delivered in two cycles with
        // the checkpoint lost in between (crash before persistence).
        let mut chain = MockChain {
            head: 100,
            ..Default::default()
        };
        chain.logs.insert(60, vec![present_intent_log(60, 7)]);

        let intents = Arc::new(MemoryStore::new());
        seed_intent(&intents, 7);
        let notifier = Arc::new(MemoryNotifier::new());

        // First process: fresh checkpoint store, scans and fulfills.
        let mut first = scheduler(
            chain.clone(),
            Arc::new(MemoryStore::new()),
            intents.clone(),
            notifier.clone(),
        );
        let summary = first.run_cycle().await.unwrap().unwrap();
        assert_eq!(summary.events_processed, 1);

        // Simulated restart: the checkpoint never made it to disk, so the
        // second process rescans the same range and refetches the log.
        let mut second = scheduler(
            chain,
            Arc::new(MemoryStore::new()),
            intents.clone(),
            notifier.clone(),
        );
        let summary = second.run_cycle().await.unwrap().unwrap();
        assert_eq!(summary.events_processed, 0);

        assert_eq!(intents.intent_status(7), Some(IntentStatus::Completed));
        assert_eq!(notifier.notification_count(), 1);
        assert_eq!(notifier.sms_count(), 1);
    }

    #[tokio::test]
    async fn second_cycle_resumes_from_the_checkpoint() {
        let mut chain = MockChain {
            head: 100,
            ..Default::default()
        };
        chain.logs.insert(60, vec![present_intent_log(60, 7)]);

        let checkpoints = Arc::new(MemoryStore::new());
        let intents = Arc::new(MemoryStore::new());
        seed_intent(&intents, 7);
        let notifier = Arc::new(MemoryNotifier::new());

        let mut sched = scheduler(chain, checkpoints, intents.clone(), notifier.clone());

        let first = sched.run_cycle().await.unwrap().unwrap();
        assert_eq!(first.events_processed, 1);
        assert_eq!(first.start_block, 1);

        // Second cycle starts inside the safety window behind 99 and
        // processes nothing new.
        let second = sched.run_cycle().await.unwrap().unwrap();
        assert_eq!(second.start_block, 99 - 12);
        assert_eq!(second.events_processed, 0);
        assert_eq!(notifier.notification_count(), 1);
    }

    #[tokio::test]
    async fn forked_event_data_is_purged_on_the_next_cycle() {
        let mut chain = MockChain {
            head: 100,
            ..Default::default()
        };
        chain.logs.insert(95, vec![present_intent_log(95, 7)]);

        let checkpoints = Arc::new(MemoryStore::new());
        let intents = Arc::new(MemoryStore::new());
        seed_intent(&intents, 7);
        let notifier = Arc::new(MemoryNotifier::new());

        let mut sched = scheduler(
            chain,
            checkpoints.clone(),
            intents.clone(),
            notifier.clone(),
        );
        sched.run_cycle().await.unwrap().unwrap();
        assert_eq!(sched.state().record_count(), 1);

        // The chain reorganised: block 95 no longer carries the log. The
        // next cycle drops the in-window record and rescans; the intent
        // stays completed (fulfillment is never undone by a reorg).
        let reorged_chain = MockChain {
            head: 100,
            ..Default::default()
        };
        let mut reorged = scheduler(reorged_chain, checkpoints, intents.clone(), notifier.clone());
        reorged.run_cycle().await.unwrap().unwrap();
        assert_eq!(reorged.state().record_count(), 0);
        assert_eq!(intents.intent_status(7), Some(IntentStatus::Completed));
        assert_eq!(notifier.notification_count(), 1);
    }
}
