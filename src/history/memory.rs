//! In-memory history store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HistoryError;
use crate::history::traits::{AppendOutcome, HistoryEntry, HistoryStore};

/// History kept in a map keyed by claim id.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with pre-existing or corrupt rows.
    pub async fn insert(&self, entry: HistoryEntry) {
        self.entries
            .write()
            .await
            .entry(entry.claim_id.clone())
            .or_default()
            .push(entry);
    }

    /// Number of entries recorded for a claim.
    pub async fn count(&self, claim_id: &str) -> usize {
        self.entries
            .read()
            .await
            .get(claim_id)
            .map_or(0, Vec::len)
    }

    /// Snapshot of all entries for a claim.
    pub async fn entries_for(&self, claim_id: &str) -> Vec<HistoryEntry> {
        self.entries
            .read()
            .await
            .get(claim_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn query(&self, claim_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.entries_for(claim_id).await)
    }

    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.insert(entry.clone()).await;
        Ok(())
    }

    async fn append_if_count(
        &self,
        entry: &HistoryEntry,
        expected_count: usize,
    ) -> Result<AppendOutcome, HistoryError> {
        // Count and push under one write lock.
        let mut entries = self.entries.write().await;
        let rows = entries.entry(entry.claim_id.clone()).or_default();
        if rows.len() != expected_count {
            return Ok(AppendOutcome::CountChanged { actual: rows.len() });
        }
        rows.push(entry.clone());
        Ok(AppendOutcome::Appended)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn query_unknown_claim_is_empty() {
        let store = InMemoryHistoryStore::new();
        assert!(store.query("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_is_scoped_by_claim() {
        let store = InMemoryHistoryStore::new();
        store
            .append(&HistoryEntry::sent_at("a", Utc::now()))
            .await
            .unwrap();
        store
            .append(&HistoryEntry::sent_at("a", Utc::now()))
            .await
            .unwrap();
        store
            .append(&HistoryEntry::sent_at("b", Utc::now()))
            .await
            .unwrap();

        assert_eq!(store.query("a").await.unwrap().len(), 2);
        assert_eq!(store.query("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conditional_append_detects_count_change() {
        let store = InMemoryHistoryStore::new();
        let entry = HistoryEntry::sent_at("c", Utc::now());

        assert_eq!(
            store.append_if_count(&entry, 0).await.unwrap(),
            AppendOutcome::Appended
        );
        // A second writer that also observed zero entries loses.
        assert_eq!(
            store.append_if_count(&entry, 0).await.unwrap(),
            AppendOutcome::CountChanged { actual: 1 }
        );
        assert_eq!(store.count("c").await, 1);
    }
}
