//! Delivery queue: where approved claim notifications are published.
//!
//! The queue is pure transport: it takes a destination and an opaque
//! payload. Deciding *whether* to publish lives in the pipeline.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::error::QueueError;

pub use http::HttpDeliveryQueue;
pub use memory::{InMemoryQueue, PublishedMessage};

/// Acknowledgement from the queue for one published message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Queue-assigned message id, when the backend reports one.
    pub message_id: Option<String>,
}

/// Trait for delivery queue clients.
///
/// One call publishes one message. Implementations must not retry
/// internally.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Queue name for logging.
    fn name(&self) -> &str;

    async fn publish(&self, destination: &str, payload: &str)
    -> Result<PublishReceipt, QueueError>;
}
