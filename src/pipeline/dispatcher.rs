//! Dispatcher: serializes a claim and publishes it to the delivery queue.
//!
//! The dispatcher never touches the history store. A successful publish
//! yields a [`DispatchIntent`]; committing that intent (appending the
//! history entry) is the caller's job, and only happens after the publish
//! is confirmed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::claims::Claim;
use crate::error::DispatchError;
use crate::history::HistoryEntry;
use crate::queue::DeliveryQueue;

/// A confirmed publish whose history entry has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchIntent {
    pub claim_id: String,
    /// History entry count the SEND decision was based on.
    pub observed_count: usize,
    /// Instant the decision was taken; becomes the entry's `dateSent`.
    pub decided_at: DateTime<Utc>,
    pub message_id: Option<String>,
}

impl DispatchIntent {
    /// The history entry this intent commits.
    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry::sent_at(self.claim_id.clone(), self.decided_at)
    }
}

/// Publishes claims to one queue destination.
pub struct Dispatcher {
    queue: Arc<dyn DeliveryQueue>,
    destination: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn DeliveryQueue>, destination: String, timeout: Duration) -> Self {
        Self {
            queue,
            destination,
            timeout,
        }
    }

    /// Serialize the claim into its queue payload.
    pub fn payload(claim: &Claim) -> Result<String, DispatchError> {
        serde_json::to_string(claim).map_err(|e| DispatchError::Serialization {
            claim_id: claim.claim_id.clone(),
            source: e,
        })
    }

    /// Publish one claim. Exactly one publish attempt, no retry.
    pub async fn dispatch(
        &self,
        claim: &Claim,
        observed_count: usize,
        decided_at: DateTime<Utc>,
    ) -> Result<DispatchIntent, DispatchError> {
        let payload = Self::payload(claim)?;

        debug!(
            claim_id = %claim.claim_id,
            queue = self.queue.name(),
            bytes = payload.len(),
            "Publishing claim"
        );

        let receipt = tokio::time::timeout(
            self.timeout,
            self.queue.publish(&self.destination, &payload),
        )
        .await
        .map_err(|_| DispatchError::Timeout {
            claim_id: claim.claim_id.clone(),
            timeout: self.timeout,
        })?
        .map_err(|e| DispatchError::Publish {
            claim_id: claim.claim_id.clone(),
            source: e,
        })?;

        info!(
            claim_id = %claim.claim_id,
            claim_number = %claim.claim_number,
            message_id = receipt.message_id.as_deref().unwrap_or("none"),
            "Claim published"
        );

        Ok(DispatchIntent {
            claim_id: claim.claim_id.clone(),
            observed_count,
            decided_at,
            message_id: receipt.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::QueueError;
    use crate::queue::{InMemoryQueue, PublishReceipt};

    struct RejectingQueue;

    #[async_trait]
    impl DeliveryQueue for RejectingQueue {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn publish(&self, _: &str, _: &str) -> Result<PublishReceipt, QueueError> {
            Err(QueueError::Rejected {
                status: 500,
                body: "boom".into(),
            })
        }
    }

    struct StalledQueue;

    #[async_trait]
    impl DeliveryQueue for StalledQueue {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn publish(&self, _: &str, _: &str) -> Result<PublishReceipt, QueueError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(PublishReceipt::default())
        }
    }

    fn claim() -> Claim {
        Claim::new("c-1", "CN-1").with_field("status", serde_json::json!("open"))
    }

    #[tokio::test]
    async fn publishes_payload_once() {
        let queue = Arc::new(InMemoryQueue::new());
        let dispatcher = Dispatcher::new(queue.clone(), "claims".into(), Duration::from_secs(5));
        let now = Utc::now();

        let intent = dispatcher.dispatch(&claim(), 1, now).await.unwrap();

        let published = queue.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].destination, "claims");
        let body: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
        assert_eq!(body["claimId"], "c-1");
        assert_eq!(body["claimNumber"], "CN-1");
        assert_eq!(body["status"], "open");

        assert_eq!(intent.claim_id, "c-1");
        assert_eq!(intent.observed_count, 1);
        assert_eq!(intent.message_id.as_deref(), Some(published[0].message_id.as_str()));
        assert_eq!(intent.history_entry(), HistoryEntry::sent_at("c-1", now));
    }

    #[tokio::test]
    async fn publish_failure_is_typed() {
        let dispatcher =
            Dispatcher::new(Arc::new(RejectingQueue), "claims".into(), Duration::from_secs(5));
        let err = dispatcher.dispatch(&claim(), 0, Utc::now()).await.unwrap_err();
        match err {
            DispatchError::Publish { claim_id, source } => {
                assert_eq!(claim_id, "c-1");
                assert!(matches!(source, QueueError::Rejected { status: 500, .. }));
            }
            other => panic!("Expected Publish error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_is_bounded_by_timeout() {
        let dispatcher =
            Dispatcher::new(Arc::new(StalledQueue), "claims".into(), Duration::from_secs(30));
        let err = dispatcher.dispatch(&claim(), 0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { .. }));
    }
}
