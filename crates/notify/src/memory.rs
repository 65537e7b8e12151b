use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Publisher, PublishError, Result};

/// A message captured by `InMemoryPublisher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

/// Publisher that records messages instead of sending them.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    messages: Arc<RwLock<Vec<PublishedMessage>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryPublisher {
    /// Creates a new publisher with no recorded messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns every recorded message in publish order.
    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.clone()
    }

    /// Returns the payloads recorded on `topic`.
    pub async fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Number of recorded messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Returns true if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Unavailable(
                "in-memory publisher marked failing".to_string(),
            ));
        }

        self.messages.write().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
