//! In-memory storage and notification backends.
//!
//! Keeps the checkpoint document, intent requests, and gift payloads in
//! RAM. Useful for tests and short-lived runs that don't need persistence;
//! all data is lost when the process exits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use giftscan_core::{
    Checkpoint, CheckpointStore, GiftRecord, IntentRequest, IntentStatus, IntentStore,
    NotificationClient, ScanError,
};

/// In-memory checkpoint, intent, and gift storage.
#[derive(Default)]
pub struct MemoryStore {
    checkpoint: Mutex<Option<Checkpoint>>,
    intents: Mutex<HashMap<u64, IntentRequest>>,
    gifts: Mutex<HashMap<(String, String), GiftRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an intent request.
    pub fn insert_intent(&self, intent: IntentRequest) {
        self.intents.lock().unwrap().insert(intent.intent_id, intent);
    }

    /// Seed a gift payload.
    pub fn insert_gift(&self, record: GiftRecord) {
        let key = (record.nft_id.clone(), record.category_id.clone());
        self.gifts.lock().unwrap().insert(key, record);
    }

    /// Current status of an intent, if known.
    pub fn intent_status(&self, intent_id: u64) -> Option<IntentStatus> {
        self.intents
            .lock()
            .unwrap()
            .get(&intent_id)
            .map(|intent| intent.status)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self) -> Result<Option<Checkpoint>, ScanError> {
        Ok(self.checkpoint.lock().unwrap().clone())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), ScanError> {
        *self.checkpoint.lock().unwrap() = Some(checkpoint.clone());
        Ok(())
    }
}

#[async_trait]
impl IntentStore for MemoryStore {
    async fn is_completed(&self, intent_id: u64) -> Result<bool, ScanError> {
        Ok(self
            .intents
            .lock()
            .unwrap()
            .get(&intent_id)
            .is_some_and(|intent| intent.status == IntentStatus::Completed))
    }

    async fn find_pending(
        &self,
        intent_id: u64,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<IntentRequest>, ScanError> {
        Ok(self
            .intents
            .lock()
            .unwrap()
            .get(&intent_id)
            .filter(|intent| {
                intent.status == IntentStatus::Pending
                    && intent.nft_id == nft_id
                    && intent.category_id == category_id
            })
            .cloned())
    }

    async fn mark_completed(&self, intent_id: u64) -> Result<bool, ScanError> {
        let mut intents = self.intents.lock().unwrap();
        match intents.get_mut(&intent_id) {
            Some(intent) if intent.status == IntentStatus::Pending => {
                intent.status = IntentStatus::Completed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_gift(
        &self,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<GiftRecord>, ScanError> {
        let key = (nft_id.to_string(), category_id.to_string());
        Ok(self.gifts.lock().unwrap().get(&key).cloned())
    }
}

// ─── MemoryNotifier ──────────────────────────────────────────────────────────

/// Records outbound notifications instead of delivering them.
#[derive(Default)]
pub struct MemoryNotifier {
    notifications: Mutex<Vec<(String, serde_json::Value)>>,
    sms: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn sms_count(&self) -> usize {
        self.sms.lock().unwrap().len()
    }

    /// All recorded `(kind, metadata)` notifications.
    pub fn notifications(&self) -> Vec<(String, serde_json::Value)> {
        self.notifications.lock().unwrap().clone()
    }

    /// All recorded `(phone, message)` SMS sends.
    pub fn sms_messages(&self) -> Vec<(String, String)> {
        self.sms.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationClient for MemoryNotifier {
    async fn post_notification(
        &self,
        kind: &str,
        metadata: serde_json::Value,
    ) -> Result<(), ScanError> {
        self.notifications
            .lock()
            .unwrap()
            .push((kind.to_string(), metadata));
        Ok(())
    }

    async fn post_sms(&self, mobile_phone: &str, message: &str) -> Result<(), ScanError> {
        self.sms
            .lock()
            .unwrap()
            .push((mobile_phone.to_string(), message.to_string()));
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use giftscan_core::Gift;

    fn intent(intent_id: u64, status: IntentStatus) -> IntentRequest {
        IntentRequest {
            intent_id,
            category_id: "2".into(),
            nft_id: "42".into(),
            phone: "+15550100".into(),
            status,
            requested_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut checkpoint = Checkpoint::default();
        checkpoint.last_scanned_block = 123;
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.last_scanned_block, 123);
    }

    #[tokio::test]
    async fn find_pending_matches_the_full_identity() {
        let store = MemoryStore::new();
        store.insert_intent(intent(7, IntentStatus::Pending));

        assert!(store.find_pending(7, "42", "2").await.unwrap().is_some());
        // Wrong collectible or category: no match.
        assert!(store.find_pending(7, "41", "2").await.unwrap().is_none());
        assert!(store.find_pending(7, "42", "3").await.unwrap().is_none());
        assert!(store.find_pending(8, "42", "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_completed_is_a_filtered_transition() {
        let store = MemoryStore::new();
        store.insert_intent(intent(7, IntentStatus::Pending));

        assert!(store.mark_completed(7).await.unwrap());
        assert_eq!(store.intent_status(7), Some(IntentStatus::Completed));
        assert!(store.is_completed(7).await.unwrap());

        // Second transition finds nothing pending.
        assert!(!store.mark_completed(7).await.unwrap());
        // Unknown intents are not completed.
        assert!(!store.mark_completed(99).await.unwrap());
        assert!(!store.is_completed(99).await.unwrap());
    }

    #[tokio::test]
    async fn completed_intent_is_not_pending() {
        let store = MemoryStore::new();
        store.insert_intent(intent(7, IntentStatus::Completed));
        assert!(store.find_pending(7, "42", "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gift_lookup_by_collectible_and_category() {
        let store = MemoryStore::new();
        store.insert_gift(GiftRecord {
            nft_id: "42".into(),
            category_id: "2".into(),
            gifts: vec![Gift {
                sms_short_name: "Coffee".into(),
                promo_code: "BREW-1".into(),
            }],
        });

        let found = store.find_gift("42", "2").await.unwrap().unwrap();
        assert_eq!(found.gifts.len(), 1);
        assert!(store.find_gift("42", "9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn notifier_records_both_channels() {
        let notifier = MemoryNotifier::new();
        notifier
            .post_sms("+15550100", "Coffee - BREW-1")
            .await
            .unwrap();
        notifier
            .post_notification("nft_conversion", serde_json::json!({"nft_id": "42"}))
            .await
            .unwrap();

        assert_eq!(notifier.sms_count(), 1);
        assert_eq!(notifier.notification_count(), 1);
        assert_eq!(notifier.sms_messages()[0].1, "Coffee - BREW-1");
        assert_eq!(notifier.notifications()[0].0, "nft_conversion");
    }
}
