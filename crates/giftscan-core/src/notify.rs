//! Outbound notification contract and message preparation.
//!
//! Delivery mechanics (SMS gateway, chat platform) live behind
//! `NotificationClient`; this module only shapes the payloads.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::error::ScanError;
use crate::intents::{Gift, IntentRequest};

/// Transport for outbound notifications.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Post a structured notification of the given kind.
    async fn post_notification(
        &self,
        kind: &str,
        metadata: serde_json::Value,
    ) -> Result<(), ScanError>;

    /// Send a plain SMS.
    async fn post_sms(&self, mobile_phone: &str, message: &str) -> Result<(), ScanError>;
}

/// Prepares and dispatches the per-intent notifications: an SMS with the
/// promo codes and a structured chat notification.
pub struct NotificationSender {
    notification_kind: String,
    /// category_id → human-readable category name.
    category_names: HashMap<String, String>,
}

impl NotificationSender {
    pub fn new(
        notification_kind: impl Into<String>,
        category_names: HashMap<String, String>,
    ) -> Self {
        Self {
            notification_kind: notification_kind.into(),
            category_names,
        }
    }

    /// Send the promo codes for a converted collectible via SMS.
    pub async fn send_sms_converted_gifts(
        &self,
        client: &dyn NotificationClient,
        gifts: &[Gift],
        phone: &str,
    ) -> Result<(), ScanError> {
        client.post_sms(phone, &prepare_message(gifts)).await?;
        info!(phone, gifts = gifts.len(), "gift promo codes sent via sms");
        Ok(())
    }

    /// Send the structured conversion notification for an intent.
    pub async fn send_conversion_notification(
        &self,
        client: &dyn NotificationClient,
        intent: &IntentRequest,
        gifts: &[Gift],
    ) -> Result<(), ScanError> {
        let category = self
            .category_names
            .get(&intent.category_id)
            .cloned()
            .unwrap_or_else(|| intent.category_id.clone());

        client
            .post_notification(
                &self.notification_kind,
                json!({
                    "nft_id": intent.nft_id,
                    "nft_category": category,
                    "gifts": gifts,
                    "phone": intent.phone,
                }),
            )
            .await
    }
}

/// One `"{smsShortName} - {promoCode}"` line per gift.
pub fn prepare_message(gifts: &[Gift]) -> String {
    gifts
        .iter()
        .map(|gift| format!("{} - {}", gift.sms_short_name, gift.promo_code))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift(name: &str, code: &str) -> Gift {
        Gift {
            sms_short_name: name.into(),
            promo_code: code.into(),
        }
    }

    #[test]
    fn message_joins_gifts_line_per_entry() {
        let gifts = vec![gift("Coffee", "BREW-1"), gift("Mug", "CUP-2")];
        assert_eq!(prepare_message(&gifts), "Coffee - BREW-1\nMug - CUP-2");
    }

    #[test]
    fn message_for_single_gift_has_no_newline() {
        assert_eq!(prepare_message(&[gift("Coffee", "BREW-1")]), "Coffee - BREW-1");
    }

    #[test]
    fn empty_gift_list_is_empty_message() {
        assert_eq!(prepare_message(&[]), "");
    }
}
