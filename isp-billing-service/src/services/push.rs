//! Push delivery to customer browser subscriptions.

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::config::PushConfig;
use crate::models::PushSubscription;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push delivery not enabled")]
    NotEnabled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Push service error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Subscription rejected: {0}")]
    Rejected(String),
}

impl PushError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PushError::Connection(_) => true,
            PushError::Upstream { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            _ => false,
        }
    }
}

/// Payload posted to a subscription endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage)
        -> Result<(), PushError>;

    fn is_enabled(&self) -> bool;
}

/// Deliver one message, retrying transient failures with exponential backoff
/// until `max_elapsed` has passed.
pub async fn send_with_retry(
    sender: &dyn PushSender,
    subscription: &PushSubscription,
    message: &PushMessage,
    max_elapsed: Duration,
) -> Result<(), PushError> {
    let backoff = ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    retry(backoff, || async {
        sender.send(subscription, message).await.map_err(|e| {
            if e.is_transient() {
                tracing::debug!(
                    subscription_id = %subscription.subscription_id,
                    error = %e,
                    "Transient push failure, retrying"
                );
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
}

/// Posts JSON `{title, body, data}` to the subscription endpoint.
pub struct WebPushSender {
    enabled: bool,
    client: Client,
}

impl WebPushSender {
    pub fn new(config: &PushConfig) -> Result<Self, PushError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PushError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            enabled: config.enabled,
            client,
        })
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError> {
        if !self.enabled {
            return Err(PushError::NotEnabled);
        }

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", "86400")
            .json(message)
            .send()
            .await
            .map_err(|e| PushError::Connection(format!("Failed to reach push service: {}", e)))?;

        let status = response.status();
        if status == StatusCode::GONE || status == StatusCode::NOT_FOUND {
            return Err(PushError::Rejected(format!(
                "Endpoint returned {} for subscription {}",
                status, subscription.subscription_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            subscription_id = %subscription.subscription_id,
            title = %message.title,
            "Push notification delivered"
        );

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Mock push sender for testing. Endpoints registered with
/// [`MockPushSender::fail_endpoint`] are rejected.
#[derive(Default)]
pub struct MockPushSender {
    send_count: AtomicU64,
    failing_endpoints: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<(String, PushMessage)>>,
}

impl MockPushSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_endpoint(&self, endpoint: &str) {
        if let Ok(mut failing) = self.failing_endpoints.lock() {
            failing.insert(endpoint.to_string());
        }
    }

    /// Number of attempted sends, including failed ones.
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    /// Successfully delivered `(endpoint, message)` pairs.
    pub fn delivered(&self) -> Vec<(String, PushMessage)> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PushSender for MockPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_endpoints
            .lock()
            .map(|f| f.contains(&subscription.endpoint))
            .unwrap_or(false);
        if failing {
            return Err(PushError::Rejected(format!(
                "[MOCK] endpoint {} rejected",
                subscription.endpoint
            )));
        }

        tracing::info!(
            endpoint = %subscription.endpoint,
            title = %message.title,
            "[MOCK] Push notification would be sent"
        );

        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push((subscription.endpoint.clone(), message.clone()));
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn subscription(endpoint: &str) -> PushSubscription {
        PushSubscription {
            subscription_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            endpoint: endpoint.to_string(),
            p256dh: None,
            auth: None,
            is_active: true,
            created_utc: Utc::now(),
        }
    }

    fn message() -> PushMessage {
        PushMessage {
            title: "Bill due".to_string(),
            body: "Pay soon".to_string(),
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn only_connection_and_server_errors_are_transient() {
        assert!(PushError::Connection("reset".into()).is_transient());
        assert!(PushError::Upstream {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(PushError::Upstream {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!PushError::Upstream {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!PushError::Rejected("gone".into()).is_transient());
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let sender = MockPushSender::new();
        sender.fail_endpoint("https://push.example.com/dead");

        let result = send_with_retry(
            &sender,
            &subscription("https://push.example.com/dead"),
            &message(),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(PushError::Rejected(_))));
        assert_eq!(sender.send_count(), 1);
    }

    #[tokio::test]
    async fn mock_records_deliveries() {
        let sender = MockPushSender::new();
        send_with_retry(
            &sender,
            &subscription("https://push.example.com/ok"),
            &message(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let delivered = sender.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "https://push.example.com/ok");
    }
}
