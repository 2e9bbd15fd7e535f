//! SQLite-backed [`DocumentRepository`] over an async connection handle.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::errors::IngestError;
use crate::repository::{ChunkRow, DocumentRecord, DocumentRepository, DocumentStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    title          TEXT NOT NULL,
    file_path      TEXT,
    markdown       TEXT,
    status         TEXT NOT NULL DEFAULT 'pending',
    status_details TEXT,
    chunk_blob     TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);

CREATE TABLE IF NOT EXISTS chunks (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid           TEXT NOT NULL UNIQUE,
    document_id    INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_text     TEXT NOT NULL,
    chunk_index    INTEGER NOT NULL,
    chunk_metadata TEXT,
    created_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id);
";

const DOCUMENT_COLUMNS: &str =
    "id, title, file_path, markdown, status, status_details, chunk_blob, created_at, updated_at";

/// Column values of a `documents` row before domain conversion.
///
/// Row mapping happens on the connection thread where only SQLite errors can
/// be reported; status, timestamp, and blob parsing move to
/// [`DocumentRecord::try_from`] so they surface as [`IngestError`]s.
struct RawDocument {
    id: i64,
    title: String,
    file_path: Option<String>,
    markdown: Option<String>,
    status: String,
    status_details: Option<String>,
    chunk_blob: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RawDocument> for DocumentRecord {
    type Error = IngestError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let parse_ts = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| {
                    IngestError::SchemaValidation(format!("bad timestamp '{raw}': {err}"))
                })
        };

        Ok(DocumentRecord {
            id: raw.id,
            title: raw.title,
            file_path: raw.file_path,
            markdown: raw.markdown,
            status: DocumentStatus::from_str(&raw.status)?,
            status_details: raw.status_details,
            chunk_blob: raw
                .chunk_blob
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_ts(&raw.created_at)?,
            updated_at: parse_ts(&raw.updated_at)?,
        })
    }
}

/// [`DocumentRepository`] over a single async SQLite connection.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IngestError> {
        let conn = Connection::open(path.as_ref()).await?;
        let repo = Self::init(conn).await?;
        info!(path = %path.as_ref().display(), "sqlite repository opened");
        Ok(repo)
    }

    /// In-memory database, used by tests and throwaway runs.
    pub async fn open_in_memory() -> Result<Self, IngestError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, IngestError> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl DocumentRepository for SqliteRepository {
    async fn create_document(
        &self,
        title: &str,
        file_path: Option<&str>,
        status: DocumentStatus,
    ) -> Result<i64, IngestError> {
        let title = title.to_string();
        let file_path = file_path.map(str::to_string);
        let now = Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (title, file_path, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    (&title, &file_path, status.as_str(), &now),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, IngestError> {
        let raw = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                    [&id],
                    |row| {
                        Ok(RawDocument {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            file_path: row.get(2)?,
                            markdown: row.get(3)?,
                            status: row.get(4)?,
                            status_details: row.get(5)?,
                            chunk_blob: row.get(6)?,
                            created_at: row.get(7)?,
                            updated_at: row.get(8)?,
                        })
                    },
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        raw.map(DocumentRecord::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        details: Option<&str>,
    ) -> Result<(), IngestError> {
        let details = details.map(str::to_string);
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET status = ?2, status_details = ?3, updated_at = ?4
                     WHERE id = ?1",
                    (&id, status.as_str(), &details, &now),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        if changed == 0 {
            return Err(IngestError::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn update_markdown(&self, id: i64, markdown: &str) -> Result<(), IngestError> {
        let markdown = markdown.to_string();
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET markdown = ?2, updated_at = ?3 WHERE id = ?1",
                    (&id, &markdown, &now),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        if changed == 0 {
            return Err(IngestError::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn store_chunk_blob(
        &self,
        id: i64,
        chunks: &serde_json::Value,
    ) -> Result<(), IngestError> {
        let blob = chunks.to_string();
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET chunk_blob = ?2, updated_at = ?3 WHERE id = ?1",
                    (&id, &blob, &now),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        if changed == 0 {
            return Err(IngestError::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn clear_chunk_blob(&self, id: i64) -> Result<(), IngestError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET chunk_blob = NULL, updated_at = ?2 WHERE id = ?1",
                    (&id, &now),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await?;
        if changed == 0 {
            return Err(IngestError::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn insert_chunks(&self, document_id: i64, rows: &[ChunkRow]) -> Result<(), IngestError> {
        if rows.is_empty() {
            return Ok(());
        }
        let rows = rows.to_vec();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                {
                    let mut stmt = tx
                        .prepare(
                            "INSERT INTO chunks
                             (uuid, document_id, chunk_text, chunk_index, chunk_metadata,
                              created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        )
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    for row in &rows {
                        stmt.execute((
                            &row.uuid,
                            document_id,
                            &row.text,
                            row.chunk_index as i64,
                            row.metadata.to_string(),
                            &now,
                        ))
                        .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn chunks_for_document(&self, document_id: i64) -> Result<Vec<ChunkRow>, IngestError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT uuid, chunk_index, chunk_text, chunk_metadata FROM chunks
                         WHERE document_id = ?1 ORDER BY chunk_index",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mapped = stmt
                    .query_map([&document_id], |row| {
                        let metadata = row
                            .get::<_, Option<String>>(3)?
                            .and_then(|s| serde_json::from_str(&s).ok())
                            .unwrap_or(serde_json::Value::Null);
                        Ok(ChunkRow {
                            uuid: row.get(0)?,
                            chunk_index: row.get::<_, i64>(1)? as usize,
                            text: row.get(2)?,
                            metadata,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in mapped {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await?;
        Ok(rows)
    }

    async fn documents_with_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRecord>, IngestError> {
        let raws = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {DOCUMENT_COLUMNS} FROM documents
                         WHERE status = ?1 ORDER BY created_at DESC, id DESC"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mapped = stmt
                    .query_map([status.as_str()], |row| {
                        Ok(RawDocument {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            file_path: row.get(2)?,
                            markdown: row.get(3)?,
                            status: row.get(4)?,
                            status_details: row.get(5)?,
                            chunk_blob: row.get(6)?,
                            created_at: row.get(7)?,
                            updated_at: row.get(8)?,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in mapped {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await?;
        raws.into_iter().map(DocumentRecord::try_from).collect()
    }
}
