//! Merchant webhook notifications
//!
//! When a payment reaches a terminal status and the team has webhooks
//! enabled, the engine fires a best-effort notification at the team's
//! notification URL. The body is signed with HMAC-SHA256 over the exact
//! bytes sent, keyed by the team secret. Delivery is fire-and-forget
//! with a bounded in-process retry count; there is no durable queue.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::warn;

use paygate_types::{Currency, PaymentStatus};

type HmacSha256 = Hmac<Sha256>;

/// Signature header on every delivery
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookEvent {
    pub payment_id: String,
    pub order_id: String,
    pub team_slug: String,
    pub status: PaymentStatus,
    pub amount: i64,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
}

/// Delivery seam so tests can capture notifications in memory.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(
        &self,
        url: &str,
        event: &WebhookEvent,
        secret: &str,
        timeout: Duration,
        retries: u32,
    );
}

/// Lowercase hex HMAC-SHA256 of the body
pub fn sign_body(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("hmac accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub struct HttpWebhookSender {
    client: reqwest::Client,
}

impl HttpWebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpWebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(
        &self,
        url: &str,
        event: &WebhookEvent,
        secret: &str,
        timeout: Duration,
        retries: u32,
    ) {
        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to serialize webhook event");
                return;
            }
        };
        let signature = sign_body(&body, secret);

        for attempt in 0..=retries {
            let result = self
                .client
                .post(url)
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .timeout(timeout)
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => return,
                Ok(resp) => warn!(
                    url,
                    attempt,
                    status = %resp.status(),
                    payment = %event.payment_id,
                    "webhook delivery rejected"
                ),
                Err(e) => warn!(
                    url,
                    attempt,
                    payment = %event.payment_id,
                    error = %e,
                    "webhook delivery failed"
                ),
            }
        }
    }
}

/// Captures deliveries instead of sending them. Test helper.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, WebhookEvent)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<(String, WebhookEvent)> {
        self.sent.lock().expect("webhook lock poisoned").clone()
    }
}

#[async_trait]
impl WebhookSender for RecordingSender {
    async fn send(
        &self,
        url: &str,
        event: &WebhookEvent,
        _secret: &str,
        _timeout: Duration,
        _retries: u32,
    ) {
        self.sent
            .lock()
            .expect("webhook lock poisoned")
            .push((url.to_string(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_per_secret() {
        let body = br#"{"PaymentId":"pay_1"}"#;
        let a = sign_body(body, "s3cret!");
        let b = sign_body(body, "s3cret!");
        let c = sign_body(body, "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
