//! HTTP delivery queue: POSTs each payload to the destination URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::{DeliveryQueue, PublishReceipt};
use crate::error::QueueError;

/// Response header carrying the queue-assigned message id.
const MESSAGE_ID_HEADER: &str = "x-message-id";

/// Delivery queue reached over HTTP.
pub struct HttpDeliveryQueue {
    client: reqwest::Client,
}

impl HttpDeliveryQueue {
    pub fn new(timeout: Duration) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeliveryQueue for HttpDeliveryQueue {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(
        &self,
        destination: &str,
        payload: &str,
    ) -> Result<PublishReceipt, QueueError> {
        let resp = self
            .client
            .post(destination)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| QueueError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(QueueError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message_id = resp
            .headers()
            .get(MESSAGE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(PublishReceipt { message_id })
    }
}
