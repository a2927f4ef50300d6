use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use duebell_core::types::NotificationEvent;

use crate::error::{NotifyError, Result};
use crate::format::MessageFormatter;
use crate::publisher::{MessageId, OutboundMessage, Publisher};

const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of handing one cycle's events to the publisher.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishOutcome {
    pub sent: usize,
    pub failed: usize,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Formats a batch of events into one message and publishes it.
///
/// All events of a batch share one fate: either the message was accepted
/// and every event counts as sent, or none of them does.
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    topic: String,
    formatter: MessageFormatter,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        topic: impl Into<String>,
        formatter: MessageFormatter,
    ) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            formatter,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `events` as one message. Urgency labels and hours-until-due
    /// are computed against `now`, the evaluating cycle's clock.
    pub async fn publish(&self, events: &[NotificationEvent], now: DateTime<Utc>) -> PublishOutcome {
        if events.is_empty() {
            return PublishOutcome::default();
        }

        let message = self.formatter.format_batch(events, now);
        match self.send(&message).await {
            Ok(id) => {
                info!(
                    publisher = self.publisher.name(),
                    message_id = %id,
                    cards = events.len(),
                    "reminder batch published"
                );
                PublishOutcome {
                    sent: events.len(),
                    failed: 0,
                    message_id: Some(id.0),
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    publisher = self.publisher.name(),
                    cards = events.len(),
                    error = %e,
                    "reminder batch not published"
                );
                PublishOutcome {
                    sent: 0,
                    failed: events.len(),
                    message_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Publish a synthetic message to verify the endpoint and credentials.
    pub async fn publish_test(&self) -> Result<MessageId> {
        let message = self.formatter.format_test(&self.topic, Utc::now());
        let id = self.send(&message).await?;
        info!(publisher = self.publisher.name(), message_id = %id, "test notification published");
        Ok(id)
    }

    /// Check the configured topic is reachable with the current credentials.
    pub async fn check_topic(&self) -> Result<()> {
        match tokio::time::timeout(self.timeout, self.publisher.check_topic(&self.topic)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<MessageId> {
        match tokio::time::timeout(self.timeout, self.publisher.publish(&self.topic, message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
