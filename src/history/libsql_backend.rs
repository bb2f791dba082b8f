//! libSQL backend: durable `HistoryStore` implementation.
//!
//! One table per deployment, name supplied by configuration. Supports local
//! file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::validate_table_name;
use crate::error::HistoryError;
use crate::history::traits::{AppendOutcome, HistoryEntry, HistoryStore};

/// libSQL history store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlHistoryStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    table: String,
}

impl LibSqlHistoryStore {
    /// Open (or create) a local database file and ensure the table exists.
    pub async fn new_local(path: &Path, table: &str) -> crate::error::Result<Self> {
        validate_table_name(table)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                HistoryError::Unavailable(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| HistoryError::Unavailable(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db, table)?;
        store.init_schema().await?;
        info!(path = %path.display(), table = %store.table, "History store opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory(table: &str) -> crate::error::Result<Self> {
        validate_table_name(table)?;

        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                HistoryError::Unavailable(format!("Failed to create in-memory database: {e}"))
            })?;

        let store = Self::from_database(db, table)?;
        store.init_schema().await?;
        Ok(store)
    }

    fn from_database(db: LibSqlDatabase, table: &str) -> Result<Self, HistoryError> {
        let conn = db
            .connect()
            .map_err(|e| HistoryError::Unavailable(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            table: table.to_string(),
        })
    }

    async fn init_schema(&self) -> Result<(), HistoryError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                claim_id TEXT NOT NULL,
                date_sent TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_claim_id ON {table}(claim_id);",
            table = self.table
        );
        self.conn
            .execute_batch(&sql)
            .await
            .map_err(|e| HistoryError::Unavailable(format!("Failed to create schema: {e}")))?;
        Ok(())
    }

    async fn count(&self, claim_id: &str) -> Result<usize, HistoryError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT COUNT(*) FROM {} WHERE claim_id = ?1", self.table),
                params![claim_id],
            )
            .await
            .map_err(|e| query_error(claim_id, e))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(|e| query_error(claim_id, e))?;
                Ok(count.max(0) as usize)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(query_error(claim_id, e)),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn query_error(claim_id: &str, e: libsql::Error) -> HistoryError {
    HistoryError::Query {
        claim_id: claim_id.to_string(),
        reason: e.to_string(),
    }
}

fn append_error(claim_id: &str, e: libsql::Error) -> HistoryError {
    HistoryError::Append {
        claim_id: claim_id.to_string(),
        reason: e.to_string(),
    }
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(v) => libsql::Value::Text(v.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row (claim_id, date_sent) to a HistoryEntry.
///
/// A non-text `date_sent` is surfaced as missing, never coerced.
fn row_to_entry(row: &libsql::Row) -> Result<HistoryEntry, libsql::Error> {
    let claim_id: String = row.get(0)?;
    let date_sent = match row.get_value(1)? {
        libsql::Value::Text(s) => Some(s),
        _ => None,
    };
    Ok(HistoryEntry {
        claim_id,
        date_sent,
    })
}

#[async_trait]
impl HistoryStore for LibSqlHistoryStore {
    async fn query(&self, claim_id: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT claim_id, date_sent FROM {} WHERE claim_id = ?1 ORDER BY created_at ASC",
                    self.table
                ),
                params![claim_id],
            )
            .await
            .map_err(|e| query_error(claim_id, e))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| query_error(claim_id, e))? {
            entries.push(row_to_entry(&row).map_err(|e| query_error(claim_id, e))?);
        }
        debug!(claim_id, count = entries.len(), "History queried");
        Ok(entries)
    }

    async fn append(&self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (id, claim_id, date_sent, created_at) VALUES (?1, ?2, ?3, ?4)",
                    self.table
                ),
                params![
                    Uuid::new_v4().to_string(),
                    entry.claim_id.clone(),
                    opt_text(entry.date_sent.as_deref()),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| append_error(&entry.claim_id, e))?;

        debug!(claim_id = %entry.claim_id, "History entry appended");
        Ok(())
    }

    async fn append_if_count(
        &self,
        entry: &HistoryEntry,
        expected_count: usize,
    ) -> Result<AppendOutcome, HistoryError> {
        // Single statement, so the count check and insert are atomic.
        let inserted = self
            .conn
            .execute(
                &format!(
                    "INSERT INTO {table} (id, claim_id, date_sent, created_at)
                     SELECT ?1, ?2, ?3, ?4
                     WHERE (SELECT COUNT(*) FROM {table} WHERE claim_id = ?2) = ?5",
                    table = self.table
                ),
                params![
                    Uuid::new_v4().to_string(),
                    entry.claim_id.clone(),
                    opt_text(entry.date_sent.as_deref()),
                    Utc::now().to_rfc3339(),
                    expected_count as i64,
                ],
            )
            .await
            .map_err(|e| append_error(&entry.claim_id, e))?;

        if inserted == 0 {
            let actual = self.count(&entry.claim_id).await?;
            return Ok(AppendOutcome::CountChanged { actual });
        }
        debug!(claim_id = %entry.claim_id, "History entry appended (conditional)");
        Ok(AppendOutcome::Appended)
    }
}
