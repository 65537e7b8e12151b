use async_trait::async_trait;

use crate::Result;

/// Core trait for notification transports.
///
/// Payloads are opaque strings. Delivery is at-least-once: consumers must
/// tolerate duplicates.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` to `topic`.
    async fn publish(&self, topic: &str, payload: String) -> Result<()>;
}
