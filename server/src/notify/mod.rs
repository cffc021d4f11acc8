//! Post-sale notification handoff.
//!
//! A completed sale produces one [`SaleNotification`] that is published to a
//! durable queue for an external worker. Publishing happens on a spawned task
//! after the sale has committed; failures are logged and never reach the buyer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Ticket;
use crate::utils::AppResult;

pub mod amqp;

pub use amqp::{AmqpConfig, AmqpPublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "EMAIL_CONFIRMATION")]
    EmailConfirmation,
}

/// Wire format consumed by the mail worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleNotification {
    #[serde(rename = "email")]
    pub recipient_email: String,
    pub ticket_id: Uuid,
    #[serde(rename = "event")]
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

impl SaleNotification {
    pub fn confirmation(recipient_email: &str, ticket: &Ticket) -> Self {
        Self {
            recipient_email: recipient_email.to_string(),
            ticket_id: ticket.id,
            event_id: ticket.event_id,
            kind: NotificationKind::EmailConfirmation,
        }
    }
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &SaleNotification) -> AppResult<()>;
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    publisher: Arc<dyn NotificationPublisher>,
}

impl NotificationDispatcher {
    pub fn new(publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self { publisher }
    }

    /// Fire-and-forget. The handle is only useful to tests that want to wait.
    pub fn dispatch(&self, notification: SaleNotification) -> JoinHandle<()> {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            match publisher.publish(&notification).await {
                Ok(()) => debug!(ticket_id = %notification.ticket_id, "Sale notification queued"),
                Err(e) => warn!(
                    ticket_id = %notification.ticket_id,
                    error = %e,
                    "Sale notification could not be queued"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::AppError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<SaleNotification>>);

    #[async_trait]
    impl NotificationPublisher for Recording {
        async fn publish(&self, notification: &SaleNotification) -> AppResult<()> {
            self.0.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl NotificationPublisher for Unreachable {
        async fn publish(&self, _: &SaleNotification) -> AppResult<()> {
            Err(AppError::ExternalServiceError("broker down".to_string()))
        }
    }

    fn notification() -> SaleNotification {
        SaleNotification {
            recipient_email: "ana@example.com".to_string(),
            ticket_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            kind: NotificationKind::EmailConfirmation,
        }
    }

    #[test]
    fn test_wire_format_matches_worker_contract() {
        let n = notification();
        let json = serde_json::to_value(&n).unwrap();

        assert_eq!(json["email"], "ana@example.com");
        assert_eq!(json["ticket_id"], n.ticket_id.to_string());
        assert_eq!(json["event"], n.event_id.to_string());
        assert_eq!(json["type"], "EMAIL_CONFIRMATION");
    }

    #[tokio::test]
    async fn test_dispatch_publishes_in_background() {
        let recording = Arc::new(Recording::default());
        let dispatcher = NotificationDispatcher::new(recording.clone());

        let n = notification();
        dispatcher.dispatch(n.clone()).await.unwrap();

        assert_eq!(recording.0.lock().unwrap().as_slice(), &[n]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_contained() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Unreachable));
        // The spawned task completes normally even though publishing failed
        assert!(dispatcher.dispatch(notification()).await.is_ok());
    }
}
