//! HTTP notification transport.
//!
//! Posts structured notifications and SMS requests to the notification
//! gateway. Delivery failures surface as `ScanError::Notification`, which
//! aborts the chunk before the intent status transition; the rescan retries
//! the dispatch.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use giftscan_core::{NotificationClient, ScanError};

pub struct HttpNotificationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpNotificationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), ScanError> {
        self.http
            .post(format!("{}/{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ScanError::Notification(format!("{path}: {e}")))?
            .error_for_status()
            .map_err(|e| ScanError::Notification(format!("{path}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    async fn post_notification(
        &self,
        kind: &str,
        metadata: serde_json::Value,
    ) -> Result<(), ScanError> {
        debug!(kind, "posting notification");
        self.post("notifications", json!({ "kind": kind, "metadata": metadata }))
            .await
    }

    async fn post_sms(&self, mobile_phone: &str, message: &str) -> Result<(), ScanError> {
        debug!(phone = mobile_phone, "posting sms");
        self.post("sms", json!({ "phone": mobile_phone, "message": message }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_the_base_url() {
        let client = HttpNotificationClient::new("http://localhost:9000/");
        assert_eq!(client.base_url, "http://localhost:9000");
    }
}
