//! In-memory delivery queue that records every publish.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DeliveryQueue, PublishReceipt};
use crate::error::QueueError;

/// A message captured by [`InMemoryQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub message_id: String,
    pub destination: String,
    pub payload: String,
}

/// Queue that keeps published messages in memory.
#[derive(Default)]
pub struct InMemoryQueue {
    messages: RwLock<Vec<PublishedMessage>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far, in publish order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryQueue {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(
        &self,
        destination: &str,
        payload: &str,
    ) -> Result<PublishReceipt, QueueError> {
        let message_id = Uuid::new_v4().to_string();
        debug!(message_id = %message_id, destination, "Message published to memory queue");
        self.messages.write().await.push(PublishedMessage {
            message_id: message_id.clone(),
            destination: destination.to_string(),
            payload: payload.to_string(),
        });
        Ok(PublishReceipt {
            message_id: Some(message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_messages_in_order() {
        let queue = InMemoryQueue::new();
        assert!(queue.is_empty().await);

        let first = queue.publish("dest", "one").await.unwrap();
        queue.publish("dest", "two").await.unwrap();

        let published = queue.published().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].payload, "one");
        assert_eq!(published[1].payload, "two");
        assert_eq!(first.message_id.as_deref(), Some(published[0].message_id.as_str()));
    }
}
