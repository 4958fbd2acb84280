//! SQLite-backed artifact store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    sha256_hex, ArtifactError, ArtifactMeta, ArtifactStore, ListCursor, ListPage, PartReceipt,
    PutOptions, StoredArtifact, UploadSession, MAX_PART_NUMBER,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Fixed-width so session timestamps compare correctly as text.
fn session_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const META_COLUMNS: &str = "key, size, etag, content_hash, content_type, uploaded_at";

/// SQLite-backed artifact store.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
}

impl SqliteArtifactStore {
    /// Create a new SQLite artifact store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, ArtifactError> {
        let conn = Connection::open(path).map_err(|e| ArtifactError::Database(e.to_string()))?;
        conn.busy_timeout(crate::SQLITE_BUSY_TIMEOUT)
            .map_err(|e| ArtifactError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite artifact store (useful for testing).
    pub fn in_memory() -> Result<Self, ArtifactError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ArtifactError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ArtifactError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                bytes BLOB NOT NULL,
                size INTEGER NOT NULL,
                etag TEXT NOT NULL,
                content_hash TEXT,
                content_type TEXT NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS multipart_uploads (
                upload_id TEXT PRIMARY KEY,
                key TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_multipart_uploads_created_at
                ON multipart_uploads(created_at);

            CREATE TABLE IF NOT EXISTS multipart_parts (
                upload_id TEXT NOT NULL REFERENCES multipart_uploads(upload_id) ON DELETE CASCADE,
                part_number INTEGER NOT NULL,
                bytes BLOB NOT NULL,
                PRIMARY KEY (upload_id, part_number)
            );
            "#,
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ArtifactError> {
        self.conn
            .lock()
            .map_err(|_| ArtifactError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_meta(row: &rusqlite::Row) -> rusqlite::Result<ArtifactMeta> {
        let size: i64 = row.get(1)?;
        let uploaded_at_str: String = row.get(5)?;
        let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(ArtifactMeta {
            key: row.get(0)?,
            size: size.max(0) as u64,
            etag: row.get(2)?,
            content_hash: row.get(3)?,
            content_type: row.get(4)?,
            uploaded_at,
        })
    }

    fn insert_object(
        conn: &Connection,
        key: &str,
        bytes: &[u8],
        options: PutOptions,
    ) -> Result<ArtifactMeta, ArtifactError> {
        let etag = options
            .content_hash
            .clone()
            .unwrap_or_else(|| sha256_hex(bytes));
        let meta = ArtifactMeta {
            key: key.to_string(),
            size: bytes.len() as u64,
            etag,
            content_hash: options.content_hash,
            content_type: options
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            uploaded_at: options.uploaded_at.unwrap_or_else(Utc::now),
        };

        conn.execute(
            "INSERT INTO objects (key, bytes, size, etag, content_hash, content_type, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                bytes = excluded.bytes,
                size = excluded.size,
                etag = excluded.etag,
                content_hash = excluded.content_hash,
                content_type = excluded.content_type,
                uploaded_at = excluded.uploaded_at",
            params![
                meta.key,
                bytes,
                meta.size as i64,
                meta.etag,
                meta.content_hash,
                meta.content_type,
                meta.uploaded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;

        Ok(meta)
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        options: PutOptions,
    ) -> Result<ArtifactMeta, ArtifactError> {
        let conn = self.conn()?;
        Self::insert_object(&conn, key, bytes, options)
    }

    fn get(&self, key: &str) -> Result<Option<StoredArtifact>, ArtifactError> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {META_COLUMNS}, bytes FROM objects WHERE key = ?"),
            params![key],
            |row| {
                Ok(StoredArtifact {
                    meta: Self::row_to_meta(row)?,
                    bytes: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(|e| ArtifactError::Database(e.to_string()))
    }

    fn head(&self, key: &str) -> Result<Option<ArtifactMeta>, ArtifactError> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {META_COLUMNS} FROM objects WHERE key = ?"),
            params![key],
            Self::row_to_meta,
        )
        .optional()
        .map_err(|e| ArtifactError::Database(e.to_string()))
    }

    fn list(
        &self,
        prefix: &str,
        cursor: Option<&ListCursor>,
        limit: u32,
    ) -> Result<ListPage, ArtifactError> {
        let conn = self.conn()?;
        let after = cursor.map(ListCursor::token).unwrap_or("");

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {META_COLUMNS} FROM objects
                 WHERE substr(key, 1, length(?1)) = ?1 AND key > ?2
                 ORDER BY key ASC LIMIT ?3"
            ))
            .map_err(|e| ArtifactError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![prefix, after, limit], Self::row_to_meta)
            .map_err(|e| ArtifactError::Database(e.to_string()))?;

        let mut objects = Vec::new();
        for row in rows {
            objects.push(row.map_err(|e| ArtifactError::Database(e.to_string()))?);
        }

        let cursor = if limit > 0 && objects.len() == limit as usize {
            objects.last().map(|last| ListCursor::after(last.key.clone()))
        } else {
            None
        };

        Ok(ListPage { objects, cursor })
    }

    fn delete(&self, key: &str) -> Result<bool, ArtifactError> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM objects WHERE key = ?", params![key])
            .map_err(|e| ArtifactError::Database(e.to_string()))?;
        Ok(removed > 0)
    }

    fn create_upload(&self, key: &str) -> Result<UploadSession, ArtifactError> {
        let conn = self.conn()?;
        let session = UploadSession {
            upload_id: uuid::Uuid::new_v4().to_string(),
            key: key.to_string(),
            created_at: Utc::now(),
            received_bytes: 0,
        };

        conn.execute(
            "INSERT INTO multipart_uploads (upload_id, key, created_at) VALUES (?, ?, ?)",
            params![session.upload_id, session.key, session_timestamp(session.created_at)],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;

        Ok(session)
    }

    fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        bytes: &[u8],
    ) -> Result<PartReceipt, ArtifactError> {
        if part_number == 0 || part_number > MAX_PART_NUMBER {
            return Err(ArtifactError::InvalidPart(part_number));
        }

        let conn = self.conn()?;
        let exists: Option<String> = conn
            .query_row(
                "SELECT upload_id FROM multipart_uploads WHERE upload_id = ?",
                params![upload_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ArtifactError::Database(e.to_string()))?;
        if exists.is_none() {
            return Err(ArtifactError::UploadNotFound(upload_id.to_string()));
        }

        conn.execute(
            "INSERT INTO multipart_parts (upload_id, part_number, bytes) VALUES (?, ?, ?)
             ON CONFLICT(upload_id, part_number) DO UPDATE SET bytes = excluded.bytes",
            params![upload_id, part_number, bytes],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;

        Ok(PartReceipt {
            part_number,
            etag: sha256_hex(bytes),
        })
    }

    fn complete_upload(&self, upload_id: &str) -> Result<ArtifactMeta, ArtifactError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| ArtifactError::Database(e.to_string()))?;

        let key: String = tx
            .query_row(
                "SELECT key FROM multipart_uploads WHERE upload_id = ?",
                params![upload_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ArtifactError::Database(e.to_string()))?
            .ok_or_else(|| ArtifactError::UploadNotFound(upload_id.to_string()))?;

        let mut assembled = Vec::new();
        let mut part_count = 0usize;
        {
            let mut stmt = tx
                .prepare(
                    "SELECT bytes FROM multipart_parts WHERE upload_id = ? ORDER BY part_number ASC",
                )
                .map_err(|e| ArtifactError::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![upload_id], |row| row.get::<_, Vec<u8>>(0))
                .map_err(|e| ArtifactError::Database(e.to_string()))?;
            for row in rows {
                assembled.extend(row.map_err(|e| ArtifactError::Database(e.to_string()))?);
                part_count += 1;
            }
        }

        if part_count == 0 {
            return Err(ArtifactError::EmptyUpload(upload_id.to_string()));
        }

        let meta = Self::insert_object(&tx, &key, &assembled, PutOptions::new())?;

        tx.execute(
            "DELETE FROM multipart_parts WHERE upload_id = ?",
            params![upload_id],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;
        tx.execute(
            "DELETE FROM multipart_uploads WHERE upload_id = ?",
            params![upload_id],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| ArtifactError::Database(e.to_string()))?;

        Ok(meta)
    }

    fn upload_session(&self, upload_id: &str) -> Result<Option<UploadSession>, ArtifactError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT u.upload_id, u.key, u.created_at,
                    (SELECT COALESCE(SUM(length(p.bytes)), 0) FROM multipart_parts p
                     WHERE p.upload_id = u.upload_id)
             FROM multipart_uploads u WHERE u.upload_id = ?",
            params![upload_id],
            |row| {
                let created_at_str: String = row.get(2)?;
                let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                let received: i64 = row.get(3)?;
                Ok(UploadSession {
                    upload_id: row.get(0)?,
                    key: row.get(1)?,
                    created_at,
                    received_bytes: received.max(0) as u64,
                })
            },
        )
        .optional()
        .map_err(|e| ArtifactError::Database(e.to_string()))
    }

    fn abort_upload(&self, upload_id: &str) -> Result<bool, ArtifactError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM multipart_parts WHERE upload_id = ?",
            params![upload_id],
        )
        .map_err(|e| ArtifactError::Database(e.to_string()))?;
        let removed = conn
            .execute(
                "DELETE FROM multipart_uploads WHERE upload_id = ?",
                params![upload_id],
            )
            .map_err(|e| ArtifactError::Database(e.to_string()))?;
        Ok(removed > 0)
    }

    fn expire_uploads(&self, before: DateTime<Utc>) -> Result<u64, ArtifactError> {
        let conn = self.conn()?;
        // Parts follow through ON DELETE CASCADE
        let removed = conn
            .execute(
                "DELETE FROM multipart_uploads WHERE created_at < ?",
                params![session_timestamp(before)],
            )
            .map_err(|e| ArtifactError::Database(e.to_string()))?;
        Ok(removed as u64)
    }
}
