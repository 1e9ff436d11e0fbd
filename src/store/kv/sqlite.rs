//! Durable local key-value table in SQLite.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::KeyValueBackend;
use crate::store::traits::StoreError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracker_records (
        key        TEXT PRIMARY KEY,
        value      BLOB NOT NULL,
        expires_at INTEGER -- unix milliseconds
    );
    CREATE INDEX IF NOT EXISTS idx_tracker_records_expires ON tracker_records(expires_at);
";

/// Key-value records in a single SQLite table. Expired rows are invisible to
/// reads and purged on write.
#[derive(Clone)]
pub struct SqliteKeyValue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValue {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::unavailable("sqlite", e))?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::unavailable("sqlite", e))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StoreError::unavailable("sqlite", e))?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::unavailable("sqlite", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::unavailable("sqlite", e))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run_blocking<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::unavailable("sqlite", e))?
        .map_err(|e| StoreError::unavailable("sqlite", e))
    }
}

fn unix_now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl KeyValueBackend for SqliteKeyValue {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = key.to_string();
        self.run_blocking(move |conn| {
            conn.query_row(
                "SELECT value FROM tracker_records
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![key, unix_now_millis()],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let key = key.to_string();
        self.run_blocking(move |conn| {
            let now = unix_now_millis();
            let expires_at = ttl.map(|ttl| {
                now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
            });
            conn.execute(
                "DELETE FROM tracker_records WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now],
            )?;
            conn.execute(
                "INSERT INTO tracker_records (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        self.run_blocking(move |conn| {
            conn.execute("DELETE FROM tracker_records WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let prefix = prefix.to_string();
        self.run_blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM tracker_records
                 WHERE substr(key, 1, length(?1)) = ?1
                   AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix, unix_now_millis()], |row| row.get(0))?;
            rows.collect()
        })
        .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
