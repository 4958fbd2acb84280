//! SQLite-backed workflow registry implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{WorkflowError, WorkflowRegistry, WorkflowTicket};

/// SQLite-backed workflow registry.
pub struct SqliteWorkflowRegistry {
    conn: Mutex<Connection>,
}

impl SqliteWorkflowRegistry {
    /// Create a new SQLite registry, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, WorkflowError> {
        let conn = Connection::open(path).map_err(|e| WorkflowError::Database(e.to_string()))?;
        conn.busy_timeout(crate::SQLITE_BUSY_TIMEOUT)
            .map_err(|e| WorkflowError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite registry (useful for testing).
    pub fn in_memory() -> Result<Self, WorkflowError> {
        let conn =
            Connection::open_in_memory().map_err(|e| WorkflowError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), WorkflowError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                key TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                git_ref TEXT NOT NULL,
                ordering_number INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| WorkflowError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, WorkflowError> {
        self.conn
            .lock()
            .map_err(|_| WorkflowError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<WorkflowTicket> {
        let ordering_number: i64 = row.get(5)?;
        let created_at_str: String = row.get(6)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(WorkflowTicket {
            key: row.get(0)?,
            owner: row.get(1)?,
            repo: row.get(2)?,
            commit: row.get(3)?,
            git_ref: row.get(4)?,
            ordering_number: ordering_number.max(0) as u64,
            created_at,
        })
    }
}

impl WorkflowRegistry for SqliteWorkflowRegistry {
    fn register(&self, ticket: &WorkflowTicket) -> Result<(), WorkflowError> {
        let ordering = i64::try_from(ticket.ordering_number)
            .map_err(|_| WorkflowError::OrderingOutOfRange(ticket.ordering_number))?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT OR REPLACE INTO workflows (key, owner, repo, commit_sha, git_ref, ordering_number, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                ticket.key,
                ticket.owner,
                ticket.repo,
                ticket.commit,
                ticket.git_ref,
                ordering,
                ticket.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| WorkflowError::Database(e.to_string()))?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<WorkflowTicket>, WorkflowError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT key, owner, repo, commit_sha, git_ref, ordering_number, created_at FROM workflows WHERE key = ?",
            params![key],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| WorkflowError::Database(e.to_string()))
    }

    fn take(&self, key: &str) -> Result<WorkflowTicket, WorkflowError> {
        let conn = self.conn()?;

        // Single statement under the connection lock: concurrent takes cannot both see the row.
        let ticket = conn
            .query_row(
                "DELETE FROM workflows WHERE key = ?
                 RETURNING key, owner, repo, commit_sha, git_ref, ordering_number, created_at",
                params![key],
                Self::row_to_ticket,
            )
            .optional()
            .map_err(|e| WorkflowError::Database(e.to_string()))?;

        ticket.ok_or_else(|| WorkflowError::NotFound(key.to_string()))
    }
}
