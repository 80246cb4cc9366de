//! Intent requests and gift payloads — the two downstream collections the
//! scanner touches.
//!
//! The scanner only reads intents for dedup and performs a single filtered
//! status transition (`pending` → `completed`). Gift payloads are read-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Lifecycle of a redemption intent. The scanner only ever transitions
/// `Pending` → `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    Pending,
    Completed,
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A recorded request to convert a collectible into a physical gift,
/// awaiting on-chain confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    pub intent_id: u64,
    pub category_id: String,
    pub nft_id: String,
    pub phone: String,
    pub status: IntentStatus,
    pub requested_at: DateTime<Utc>,
}

/// One redeemable gift item attached to a collectible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gift {
    pub sms_short_name: String,
    pub promo_code: String,
}

/// The gift payload for one collectible, keyed by `(nft_id, category_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecord {
    pub nft_id: String,
    pub category_id: String,
    pub gifts: Vec<Gift>,
}

/// Access to the intent and gift collections.
///
/// `get_logs` redelivery makes every call here at-least-once; the status
/// checks below are what turn that into effectively-once fulfillment.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Returns `true` if the intent is already marked completed
    /// (idempotency guard against log replay).
    async fn is_completed(&self, intent_id: u64) -> Result<bool, ScanError>;

    /// Find a pending intent matching the event's identity triple.
    async fn find_pending(
        &self,
        intent_id: u64,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<IntentRequest>, ScanError>;

    /// Filtered update: transition the intent `pending` → `completed`.
    /// Returns `false` if the intent was not pending (already completed
    /// by a concurrent rescan, or unknown).
    async fn mark_completed(&self, intent_id: u64) -> Result<bool, ScanError>;

    /// Fetch the gift payload for a collectible.
    async fn find_gift(
        &self,
        nft_id: &str,
        category_id: &str,
    ) -> Result<Option<GiftRecord>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&IntentStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&IntentStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn gift_wire_format_is_camel_case() {
        let gift = Gift {
            sms_short_name: "Coffee".into(),
            promo_code: "BREW-42".into(),
        };
        let json = serde_json::to_value(&gift).unwrap();
        assert_eq!(json["smsShortName"], "Coffee");
        assert_eq!(json["promoCode"], "BREW-42");
    }
}
