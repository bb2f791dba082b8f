//! Claim data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A claim as returned by the upstream source.
///
/// Only `claim_id` drives decisions. Fields beyond the two named ones are
/// kept as-is and forwarded in the queue payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Stable identifier and history partition key.
    pub claim_id: String,
    /// Human-facing claim number.
    #[serde(default)]
    pub claim_number: String,
    /// Any other upstream fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claim {
    pub fn new(claim_id: impl Into<String>, claim_number: impl Into<String>) -> Self {
        Self {
            claim_id: claim_id.into(),
            claim_number: claim_number.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra upstream field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Check the claim can be tracked at all.
    pub fn validate(&self) -> Result<(), String> {
        if self.claim_id.trim().is_empty() {
            return Err(format!(
                "claim with number {:?} has an empty claimId",
                self.claim_number
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_and_keeps_extra_fields() {
        let raw = r#"{"claimId": "c-1", "claimNumber": "CN-100", "status": "open", "amount": 12.5}"#;
        let claim: Claim = serde_json::from_str(raw).unwrap();
        assert_eq!(claim.claim_id, "c-1");
        assert_eq!(claim.claim_number, "CN-100");
        assert_eq!(claim.extra["status"], "open");
        assert_eq!(claim.extra["amount"], 12.5);
    }

    #[test]
    fn serializes_extra_fields_flat() {
        let claim = Claim::new("c-2", "CN-200").with_field("owner", serde_json::json!("ops"));
        let json = serde_json::to_value(&claim).unwrap();
        assert_eq!(json["claimId"], "c-2");
        assert_eq!(json["claimNumber"], "CN-200");
        assert_eq!(json["owner"], "ops");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn missing_claim_number_defaults_to_empty() {
        let claim: Claim = serde_json::from_str(r#"{"claimId": "c-3"}"#).unwrap();
        assert!(claim.claim_number.is_empty());
    }

    #[test]
    fn empty_claim_id_is_invalid() {
        assert!(Claim::new("", "CN-1").validate().is_err());
        assert!(Claim::new("  ", "CN-1").validate().is_err());
        assert!(Claim::new("c-4", "CN-1").validate().is_ok());
    }
}
