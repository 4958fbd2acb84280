//! SQLite-backed cursor store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Cursor, CursorError, CursorStore};

/// SQLite-backed cursor store.
pub struct SqliteCursorStore {
    conn: Mutex<Connection>,
}

impl SqliteCursorStore {
    /// Create a new SQLite cursor store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CursorError> {
        let conn = Connection::open(path).map_err(|e| CursorError::Database(e.to_string()))?;
        conn.busy_timeout(crate::SQLITE_BUSY_TIMEOUT)
            .map_err(|e| CursorError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite cursor store (useful for testing).
    pub fn in_memory() -> Result<Self, CursorError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CursorError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CursorError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cursors (
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                git_ref TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                ordering_number INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner, repo, git_ref)
            );
            "#,
        )
        .map_err(|e| CursorError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CursorError> {
        self.conn
            .lock()
            .map_err(|_| CursorError::Database("connection lock poisoned".to_string()))
    }
}

impl CursorStore for SqliteCursorStore {
    fn get(&self, owner: &str, repo: &str, git_ref: &str) -> Result<Option<Cursor>, CursorError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT commit_sha, ordering_number, updated_at FROM cursors
             WHERE owner = ? AND repo = ? AND git_ref = ?",
            params![owner, repo, git_ref],
            |row| {
                let ordering_number: i64 = row.get(1)?;
                let updated_at_str: String = row.get(2)?;
                let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Ok(Cursor {
                    commit: row.get(0)?,
                    ordering_number: ordering_number.max(0) as u64,
                    updated_at,
                })
            },
        )
        .optional()
        .map_err(|e| CursorError::Database(e.to_string()))
    }

    fn advance(
        &self,
        owner: &str,
        repo: &str,
        git_ref: &str,
        commit: &str,
        ordering_number: u64,
    ) -> Result<bool, CursorError> {
        let ordering = i64::try_from(ordering_number)
            .map_err(|_| CursorError::OrderingOutOfRange(ordering_number))?;
        let conn = self.conn()?;

        // The guard lives in the statement so racing writers resolve inside SQLite.
        let changed = conn
            .execute(
                "INSERT INTO cursors (owner, repo, git_ref, commit_sha, ordering_number, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(owner, repo, git_ref) DO UPDATE SET
                    commit_sha = excluded.commit_sha,
                    ordering_number = excluded.ordering_number,
                    updated_at = excluded.updated_at
                 WHERE excluded.ordering_number > cursors.ordering_number",
                params![
                    owner,
                    repo,
                    git_ref,
                    commit,
                    ordering,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| CursorError::Database(e.to_string()))?;

        Ok(changed > 0)
    }
}
