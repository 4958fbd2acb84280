//! SQLite-backed download index.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{DownloadError, DownloadIndex, DOWNLOAD_NAMESPACE};

pub struct SqliteDownloadIndex {
    conn: Mutex<Connection>,
}

impl SqliteDownloadIndex {
    pub fn new(path: &Path) -> Result<Self, DownloadError> {
        let conn = Connection::open(path).map_err(|e| DownloadError::Database(e.to_string()))?;
        conn.busy_timeout(crate::SQLITE_BUSY_TIMEOUT)
            .map_err(|e| DownloadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, DownloadError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DownloadError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DownloadError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                key TEXT PRIMARY KEY,
                last_download_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DownloadError> {
        self.conn
            .lock()
            .map_err(|_| DownloadError::Database("connection lock poisoned".to_string()))
    }

    fn record_key(artifact_key: &str) -> String {
        format!("{DOWNLOAD_NAMESPACE}:{artifact_key}")
    }
}

impl DownloadIndex for SqliteDownloadIndex {
    fn record(&self, artifact_key: &str, at: DateTime<Utc>) -> Result<(), DownloadError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO downloads (key, last_download_at) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET last_download_at = excluded.last_download_at
             WHERE excluded.last_download_at > downloads.last_download_at",
            params![Self::record_key(artifact_key), at.timestamp_millis()],
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;
        Ok(())
    }

    fn last_download(&self, artifact_key: &str) -> Result<Option<DateTime<Utc>>, DownloadError> {
        let conn = self.conn()?;
        let millis: Option<i64> = conn
            .query_row(
                "SELECT last_download_at FROM downloads WHERE key = ?",
                params![Self::record_key(artifact_key)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DownloadError::Database(e.to_string()))?;

        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }

    fn remove(&self, artifact_key: &str) -> Result<(), DownloadError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM downloads WHERE key = ?",
            params![Self::record_key(artifact_key)],
        )
        .map_err(|e| DownloadError::Database(e.to_string()))?;
        Ok(())
    }
}
