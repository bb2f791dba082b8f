//! Error types for the claim notifier.

use std::time::Duration;

/// Top-level error type. Only these abort an invocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("History store error: {0}")]
    History(#[from] HistoryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Upstream claim fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode claims: {0}")]
    Decode(String),
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    #[error("History query failed for claim {claim_id}: {reason}")]
    Query { claim_id: String, reason: String },

    #[error("History append failed for claim {claim_id}: {reason}")]
    Append { claim_id: String, reason: String },

    #[error("History {operation} for claim {claim_id} timed out after {timeout:?}")]
    Timeout {
        claim_id: String,
        operation: &'static str,
        timeout: Duration,
    },
}

/// A stored history entry that cannot be interpreted.
///
/// Kept apart from a normal suppression so corrupt records stay visible.
#[derive(Debug, thiserror::Error)]
pub enum DataIntegrityError {
    #[error("dateSent missing for claim {claim_id}")]
    MissingDateSent { claim_id: String },

    #[error("dateSent {value:?} for claim {claim_id} is not RFC 3339: {reason}")]
    InvalidDateSent {
        claim_id: String,
        value: String,
        reason: String,
    },
}

/// Delivery queue transport errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Publish request failed: {0}")]
    Request(String),

    #[error("Queue rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Dispatch errors, always tagged with the claim they belong to.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to serialize claim {claim_id}: {source}")]
    Serialization {
        claim_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to publish claim {claim_id}: {source}")]
    Publish {
        claim_id: String,
        #[source]
        source: QueueError,
    },

    #[error("Publishing claim {claim_id} timed out after {timeout:?}")]
    Timeout { claim_id: String, timeout: Duration },
}

/// Per-claim failure. Logged and counted, never propagated to the invoker.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ClaimError {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidClaim(_) => "invalid_claim",
            Self::History(_) => "history",
            Self::DataIntegrity(_) => "data_integrity",
            Self::Dispatch(_) => "dispatch",
        }
    }
}

/// Result type alias for the notifier.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_error_kinds() {
        let integrity = ClaimError::from(DataIntegrityError::MissingDateSent {
            claim_id: "c-1".into(),
        });
        assert_eq!(integrity.kind(), "data_integrity");

        let history = ClaimError::from(HistoryError::Unavailable("down".into()));
        assert_eq!(history.kind(), "history");

        assert_eq!(ClaimError::InvalidClaim("empty".into()).kind(), "invalid_claim");
    }

    #[test]
    fn dispatch_error_names_claim() {
        let err = DispatchError::Publish {
            claim_id: "c-42".into(),
            source: QueueError::Rejected {
                status: 503,
                body: "busy".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("c-42"));
        assert!(msg.contains("503"));
    }
}
