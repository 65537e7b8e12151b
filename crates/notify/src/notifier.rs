use std::sync::Arc;
use std::time::Duration;

use crate::{Publisher, PublishError, ShopEvent};

/// How long a single publish may take before it is abandoned.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fire-and-forget front end for a `Publisher`.
///
/// Runs after the triggering change has committed, so a failed publish is
/// logged, counted and dropped. It never reaches the caller.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn Publisher>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publishes `event` on its topic, swallowing any failure.
    pub async fn notify(&self, event: ShopEvent) {
        let topic = event.topic();
        let event_type = event.event_type();

        match self.try_notify(&event).await {
            Ok(()) => {
                metrics::counter!("notifications_published_total", "topic" => topic)
                    .increment(1);
                tracing::debug!(topic, event_type, "notification published");
            }
            Err(e) => {
                metrics::counter!("notifications_failed_total", "topic" => topic).increment(1);
                tracing::warn!(topic, event_type, error = %e, "dropping notification");
            }
        }
    }

    async fn try_notify(&self, event: &ShopEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        tokio::time::timeout(self.timeout, self.publisher.publish(event.topic(), payload))
            .await
            .map_err(|_| PublishError::Unavailable("publish timed out".to_string()))?
    }
}
