//! SQLite backend for the record store.

use std::path::Path;
use std::str::FromStr;

use futures::future::try_join_all;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::FromRow;
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::store::records::{composite_key, Dump, HistoryEntry, Observation};

/// Schema version written to `PRAGMA user_version`.
const SCHEMA_VERSION: u32 = 1;

/// History entries returned by `history_by_tech` when the caller gives no
/// explicit limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// SQLite-backed record store.
///
/// Owns a single connection pool, constructed once at startup and shared by
/// reference across all operations. There is no cross-call atomicity: a put
/// racing a delete-by-scan observes an undefined interleaving.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn sqlite_path_from_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("sqlite://") {
        url.strip_prefix("sqlite://").unwrap_or(url).trim_start_matches('/').to_string()
    } else {
        url.to_string()
    }
}

impl SqliteStore {
    /// Open the store and ensure the schema.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config.url();
        let path = sqlite_path_from_url(url);
        let path = if path.is_empty() || path == "memory" || path == ":memory:" {
            "file::memory:?cache=shared".to_string()
        } else {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
                }
            }
            format!("file:{}?mode=rwc", path)
        };

        let opts = SqliteConnectOptions::from_str(&path)
            .map_err(|e| StoreError::StoreUnavailable(format!("invalid SQLite path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts)
            .await
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Ensure tables and indexes exist (CREATE ... IF NOT EXISTS).
    ///
    /// Idempotent: re-running against an initialized database performs no
    /// structural change.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let stmts = [
            // key: `{tech}|{date}|{code}`
            "CREATE TABLE IF NOT EXISTS ot (
                key TEXT PRIMARY KEY,
                tech TEXT NOT NULL,
                date TEXT NOT NULL,
                code TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}'
            )",
            "CREATE INDEX IF NOT EXISTS ot_by_tech_date ON ot(tech, date)",
            // AUTOINCREMENT so identifiers are monotonic and never reused
            "CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tech TEXT NOT NULL,
                date TEXT NOT NULL,
                ts INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL DEFAULT '{}'
            )",
            "CREATE INDEX IF NOT EXISTS history_by_tech ON history(tech)",
            "CREATE INDEX IF NOT EXISTS history_by_tech_date ON history(tech, date)",
        ];
        for stmt in stmts {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        }
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?;
        debug!(version = SCHEMA_VERSION, "schema ensured");
        Ok(())
    }

    // ==================== Observations ====================

    /// Insert or replace an observation by its composite key.
    ///
    /// Last write wins; there is no version check. Rejects a record whose
    /// `key` disagrees with its `tech|date|code` parts.
    pub async fn put_observation(&self, item: &Observation) -> Result<(), StoreError> {
        if !item.key_is_consistent() {
            return Err(StoreError::InvalidRecord(format!(
                "key '{}' does not match parts '{}'",
                item.key,
                composite_key(&item.tech, &item.date, &item.code)
            )));
        }
        let payload = serde_json::to_string(&item.extra)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO ot (key, tech, date, code, payload)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                tech = excluded.tech,
                date = excluded.date,
                code = excluded.code,
                payload = excluded.payload
            "#,
        )
        .bind(&item.key)
        .bind(&item.tech)
        .bind(&item.date)
        .bind(&item.code)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    /// All observations for a technician on a date.
    ///
    /// Empty when none match; order is unspecified.
    pub async fn observations_by_tech_date(
        &self,
        tech: &str,
        date: &str,
    ) -> Result<Vec<Observation>, StoreError> {
        let rows: Vec<ObservationRow> = sqlx::query_as(
            "SELECT key, tech, date, code, payload FROM ot WHERE tech = ? AND date = ?",
        )
        .bind(tech)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        rows.into_iter().map(ObservationRow::into_observation).collect()
    }

    /// Delete every observation for a technician on a date.
    ///
    /// Read-then-delete: resolves the matching set first, then issues one
    /// delete per key, all in flight at once. A put racing this call can
    /// land a record the scan never saw. The first failed delete rejects the
    /// whole call; deletes already applied are not rolled back. A no-op when
    /// nothing matches.
    pub async fn delete_observations_by_tech_date(
        &self,
        tech: &str,
        date: &str,
    ) -> Result<(), StoreError> {
        let items = self.observations_by_tech_date(tech, date).await?;
        if items.is_empty() {
            return Ok(());
        }

        let deletes = items.into_iter().map(|item| async move {
            sqlx::query("DELETE FROM ot WHERE key = ?")
                .bind(item.key)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::DeleteFailed(e.to_string()))
        });
        try_join_all(deletes).await?;
        Ok(())
    }

    // ==================== History ====================

    /// Append a history entry; returns the store-assigned identifier.
    ///
    /// Any identifier already on the entry is ignored.
    pub async fn add_history_entry(&self, entry: &HistoryEntry) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(&entry.extra)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query("INSERT INTO history (tech, date, ts, payload) VALUES (?, ?, ?, ?)")
            .bind(&entry.tech)
            .bind(&entry.date)
            .bind(entry.ts)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent history entries for a technician, newest first.
    ///
    /// Ordered by `ts` descending (entries stored without a timestamp carry
    /// 0 and sort last), identifier descending as tiebreak, truncated to
    /// `limit`. `None` means the default limit of 200.
    pub async fn history_by_tech(
        &self,
        tech: &str,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, tech, date, ts, payload FROM history \
             WHERE tech = ? ORDER BY ts DESC, id DESC LIMIT ?",
        )
        .bind(tech)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        rows.into_iter().map(HistoryRow::into_entry).collect()
    }

    // ==================== Dumps ====================

    /// Full snapshot of both collections.
    ///
    /// No ordering guarantee beyond the underlying full-scan order.
    pub async fn export_all(&self) -> Result<Dump, StoreError> {
        let ot_rows: Vec<ObservationRow> =
            sqlx::query_as("SELECT key, tech, date, code, payload FROM ot")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::ReadFailed(e.to_string()))?;
        let history_rows: Vec<HistoryRow> =
            sqlx::query_as("SELECT id, tech, date, ts, payload FROM history")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        let dump = Dump {
            ot: ot_rows
                .into_iter()
                .map(ObservationRow::into_observation)
                .collect::<Result<_, _>>()?,
            history: history_rows
                .into_iter()
                .map(HistoryRow::into_entry)
                .collect::<Result<_, _>>()?,
        };
        debug!(ot = dump.ot.len(), history = dump.history.len(), "exported dump");
        Ok(dump)
    }

    /// Load a dump produced by `export_all`.
    ///
    /// Sequential and not transactional: history entries are inserted first
    /// with their stale identifiers stripped (the store assigns fresh ones,
    /// preserving dump order), then observations are upserted with their
    /// composite keys intact, overwriting any stored record sharing a key.
    /// The first write error aborts the import; writes already applied
    /// stand.
    pub async fn import_all(&self, dump: &Dump) -> Result<(), StoreError> {
        for entry in &dump.history {
            self.add_history_entry(entry).await?;
        }
        for item in &dump.ot {
            self.put_observation(item).await?;
        }
        debug!(ot = dump.ot.len(), history = dump.history.len(), "imported dump");
        Ok(())
    }
}

#[derive(FromRow)]
struct ObservationRow {
    key: String,
    tech: String,
    date: String,
    code: String,
    payload: String,
}

impl ObservationRow {
    fn into_observation(self) -> Result<Observation, StoreError> {
        let extra = serde_json::from_str(&self.payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Observation {
            key: self.key,
            tech: self.tech,
            date: self.date,
            code: self.code,
            extra,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    tech: String,
    date: String,
    ts: i64,
    payload: String,
}

impl HistoryRow {
    fn into_entry(self) -> Result<HistoryEntry, StoreError> {
        let extra = serde_json::from_str(&self.payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(HistoryEntry {
            id: Some(self.id),
            tech: self.tech,
            date: self.date,
            ts: self.ts,
            extra,
        })
    }
}
