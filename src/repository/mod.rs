//! Relational persistence for documents and chunk rows.
//!
//! The pipeline talks to storage through [`DocumentRepository`]; the bundled
//! implementation is [`SqliteRepository`]. Chunk rows carry the UUID join key
//! that links them to their vector-store entries.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::IngestError;

pub use sqlite::SqliteRepository;

/// Lifecycle status of a document moving through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Parsing,
    Parsed,
    Chunking,
    Chunked,
    Embedding,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsing => "parsing",
            Self::Parsed => "parsed",
            Self::Chunking => "chunking",
            Self::Chunked => "chunked",
            Self::Embedding => "embedding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "parsing" => Ok(Self::Parsing),
            "parsed" => Ok(Self::Parsed),
            "chunking" => Ok(Self::Chunking),
            "chunked" => Ok(Self::Chunked),
            "embedding" => Ok(Self::Embedding),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(IngestError::SchemaValidation(format!(
                "unknown document status: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `documents` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    /// Original source locator (URL or file path), required for resume.
    pub file_path: Option<String>,
    pub markdown: Option<String>,
    pub status: DocumentStatus,
    /// Error message or status information from pipeline stages.
    pub status_details: Option<String>,
    /// Temporary chunk storage, populated only between a completed chunking
    /// stage and a successful embedding stage.
    pub chunk_blob: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the `chunks` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkRow {
    /// UUID join key shared with the vector-store entry.
    pub uuid: String,
    /// Position in the parent document, 0-indexed.
    pub chunk_index: usize,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// Storage operations the pipeline stages and runner depend on.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Creates a document row, returning its id.
    async fn create_document(
        &self,
        title: &str,
        file_path: Option<&str>,
        status: DocumentStatus,
    ) -> Result<i64, IngestError>;

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, IngestError>;

    /// Updates status and status details. Details of `None` clear the column.
    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        details: Option<&str>,
    ) -> Result<(), IngestError>;

    async fn update_markdown(&self, id: i64, markdown: &str) -> Result<(), IngestError>;

    /// Stores serialized chunks for later resume. Cleared by
    /// [`clear_chunk_blob`](Self::clear_chunk_blob) once chunk rows are
    /// persisted.
    async fn store_chunk_blob(
        &self,
        id: i64,
        chunks: &serde_json::Value,
    ) -> Result<(), IngestError>;

    async fn clear_chunk_blob(&self, id: i64) -> Result<(), IngestError>;

    async fn insert_chunks(&self, document_id: i64, rows: &[ChunkRow]) -> Result<(), IngestError>;

    /// Chunk rows for a document, ordered by `chunk_index`.
    async fn chunks_for_document(&self, document_id: i64) -> Result<Vec<ChunkRow>, IngestError>;

    /// Documents with the given status, newest first.
    async fn documents_with_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRecord>, IngestError>;
}
