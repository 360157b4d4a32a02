use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::analysis::Classification;
use crate::models::check::{CheckStatus, CheckType};
use crate::models::subscription::Subscription;

/// Event emitted for each check of a completed verification job.
#[derive(Debug, Clone, Serialize)]
pub struct CheckCompletedEvent {
    pub plugin_id: Uuid,
    pub check_type: CheckType,
    pub status: CheckStatus,
    pub classification: Option<Classification>,
}

/// Delivery backend for completion events. Implementations decide the
/// transport (webhook, bot message, mail).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(
        &self,
        user_id: Uuid,
        event: &CheckCompletedEvent,
    ) -> Result<(), NotifyError>;
}

/// Posts completion events as JSON to a configured webhook endpoint.
pub struct WebhookSink {
    http: reqwest::Client,
    endpoint: String,
}

impl WebhookSink {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    event: &'a CheckCompletedEvent,
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(
        &self,
        user_id: Uuid,
        event: &CheckCompletedEvent,
    ) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&WebhookPayload { user_id, event })
            .send()
            .await
            .map_err(NotifyError::Http)?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Best-effort fan-out of completion events to active subscribers. One
/// subscriber's failed delivery is logged and skipped; it never blocks
/// delivery to the rest.
pub struct NotificationFanout {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationFanout {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    pub async fn broadcast(&self, subscribers: &[Subscription], events: &[CheckCompletedEvent]) {
        for subscriber in subscribers {
            for event in events {
                if let Err(e) = self.sink.deliver(subscriber.user_id, event).await {
                    tracing::warn!(
                        user_id = %subscriber.user_id,
                        plugin_id = %event.plugin_id,
                        check_type = %event.check_type,
                        error = %e,
                        "notification delivery failed, skipping"
                    );
                    metrics::counter!("verification_notifications_failed").increment(1);
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook endpoint rejected the event with status {status}")]
    Rejected { status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionType;
    use std::sync::Mutex;

    struct CountingSink {
        delivered: Mutex<Vec<Uuid>>,
        fail_for: Option<Uuid>,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn deliver(
            &self,
            user_id: Uuid,
            _event: &CheckCompletedEvent,
        ) -> Result<(), NotifyError> {
            if self.fail_for == Some(user_id) {
                return Err(NotifyError::Rejected { status: 502 });
            }
            self.delivered.lock().unwrap().push(user_id);
            Ok(())
        }
    }

    fn subscription(user_id: Uuid, plugin_id: Uuid) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id,
            plugin_id,
            subscription_type: SubscriptionType::SecurityAlerts,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn one_failed_subscriber_does_not_block_the_rest() {
        let plugin_id = Uuid::new_v4();
        let failing_user = Uuid::new_v4();
        let ok_user = Uuid::new_v4();

        let sink = Arc::new(CountingSink {
            delivered: Mutex::new(Vec::new()),
            fail_for: Some(failing_user),
        });
        let fanout = NotificationFanout::new(sink.clone());

        let events = vec![CheckCompletedEvent {
            plugin_id,
            check_type: CheckType::Security,
            status: CheckStatus::Passed,
            classification: Some(Classification::Safe),
        }];
        let subscribers = vec![
            subscription(failing_user, plugin_id),
            subscription(ok_user, plugin_id),
        ];

        fanout.broadcast(&subscribers, &events).await;

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.as_slice(), &[ok_user]);
    }
}
