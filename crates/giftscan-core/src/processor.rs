//! Per-event fulfillment: dedup check, intent status transition, and
//! notification dispatch.
//!
//! Fulfillment is deliberately a separate stage from recording the event
//! into the checkpoint. Notifications are dispatched *before* the status
//! transition: a failed dispatch leaves the intent pending and the next
//! scan cycle retries it, so dispatch is at-least-once and the status
//! check deduplicates replays. An intent is never marked completed with
//! its notification silently lost.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ScanError;
use crate::intents::IntentStore;
use crate::notify::{NotificationClient, NotificationSender};
use crate::types::PresentIntentArgs;

pub struct EventProcessor {
    intents: Arc<dyn IntentStore>,
    notifications: Arc<dyn NotificationClient>,
    sender: NotificationSender,
}

impl EventProcessor {
    pub fn new(
        intents: Arc<dyn IntentStore>,
        notifications: Arc<dyn NotificationClient>,
        sender: NotificationSender,
    ) -> Self {
        Self {
            intents,
            notifications,
            sender,
        }
    }

    /// Idempotency guard: `true` if the referenced intent is already
    /// completed downstream, in which case the event is skipped even when
    /// its raw log is refetched.
    pub async fn is_completed(&self, intent_id: u64) -> Result<bool, ScanError> {
        self.intents.is_completed(intent_id).await
    }

    /// Fulfill the intent referenced by a `PresentIntent` event.
    ///
    /// Returns `true` if a matching pending intent was completed, `false`
    /// if no pending intent matched (unknown intent, mismatched token, or
    /// already completed by an earlier rescan).
    pub async fn fulfill(&self, args: &PresentIntentArgs) -> Result<bool, ScanError> {
        let nft_id = args.token_id_in_level.to_string();
        let category_id = args.level.to_string();

        let Some(intent) = self
            .intents
            .find_pending(args.present_intent_id, &nft_id, &category_id)
            .await?
        else {
            return Ok(false);
        };

        let gifts = match self.intents.find_gift(&nft_id, &category_id).await? {
            Some(record) => record.gifts,
            None => {
                // A gift payload should exist for every redeemable token;
                // notify with an empty list rather than stall the intent.
                warn!(
                    intent_id = intent.intent_id,
                    nft_id, category_id, "no gift payload found for intent"
                );
                Vec::new()
            }
        };

        self.sender
            .send_sms_converted_gifts(self.notifications.as_ref(), &gifts, &intent.phone)
            .await?;
        self.sender
            .send_conversion_notification(self.notifications.as_ref(), &intent, &gifts)
            .await?;

        let completed = self.intents.mark_completed(intent.intent_id).await?;
        info!(
            intent_id = intent.intent_id,
            nft_id = %intent.nft_id,
            status = "completed",
            "intent request fulfilled"
        );
        Ok(completed)
    }
}
