//! `HistoryStore` trait: append-only record of notifications sent per claim.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// One prior notification for a claim.
///
/// `date_sent` stays a raw string: a row may exist with a missing or corrupt
/// timestamp, and the decision engine must see that rather than a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub claim_id: String,
    #[serde(default)]
    pub date_sent: Option<String>,
}

impl HistoryEntry {
    /// Entry recording a notification sent at `sent_at`.
    pub fn sent_at(claim_id: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            claim_id: claim_id.into(),
            date_sent: Some(format_date_sent(sent_at)),
        }
    }
}

/// Canonical `dateSent` format: RFC 3339, whole seconds, `Z` suffix.
pub fn format_date_sent(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Result of a conditional append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was written.
    Appended,
    /// The claim's entry count no longer matched; nothing was written.
    CountChanged { actual: usize },
}

/// Backend-agnostic history store.
///
/// Entries are only ever appended; nothing here deletes or rewrites one.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All entries recorded for a claim, in no particular order.
    async fn query(&self, claim_id: &str) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Append an entry unconditionally.
    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError>;

    /// Append only if the claim still has `expected_count` entries.
    ///
    /// The default is a non-atomic read-then-write; backends that can do
    /// better should override it.
    async fn append_if_count(
        &self,
        entry: &HistoryEntry,
        expected_count: usize,
    ) -> Result<AppendOutcome, HistoryError> {
        let actual = self.query(&entry.claim_id).await?.len();
        if actual != expected_count {
            return Ok(AppendOutcome::CountChanged { actual });
        }
        self.append(entry).await?;
        Ok(AppendOutcome::Appended)
    }
}
