//! Central error taxonomy for the ingestion pipeline.
//!
//! Errors fall into three families:
//!
//! - **Configuration**: invalid setup detected before any stage runs
//!   (missing credentials, inconsistent chunking bounds, cyclic stage wiring).
//! - **Pipeline**: domain failures raised by a specific stage
//!   ([`IngestError::Parsing`], [`IngestError::Chunking`],
//!   [`IngestError::Embedding`]). Stages catch these themselves and fold them
//!   into the [`PipelineContext`](crate::context::PipelineContext) rather than
//!   letting them escape.
//! - **Database**: persistence-layer failures, including the fatal
//!   [`IngestError::DocumentNotFound`] on resume with an unknown id.

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced anywhere in the ingestion pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    /// Missing or invalid setup; surfaces before any stage runs.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(docsmith::configuration),
        help("Check environment variables and config field constraints.")
    )]
    Configuration(String),

    /// Stage wiring forms a cycle; raised once at orchestrator construction.
    #[error("cyclic dependency detected in pipeline stages: {0}")]
    #[diagnostic(
        code(docsmith::cyclic_dependency),
        help("Review the required_stages declarations of the listed stages.")
    )]
    CyclicDependency(String),

    /// Generic pipeline-level failure that is not tied to a single stage.
    #[error("pipeline error: {0}")]
    #[diagnostic(code(docsmith::pipeline))]
    Pipeline(String),

    /// Document parsing failed (fetch, extraction, or empty result).
    #[error("parsing failed: {0}")]
    #[diagnostic(code(docsmith::parsing))]
    Parsing(String),

    /// Text chunking failed (empty input, model load, splitter failure).
    #[error("chunking failed: {0}")]
    #[diagnostic(code(docsmith::chunking))]
    Chunking(String),

    /// Embedding or vector-store interaction failed.
    #[error("embedding failed: {0}")]
    #[diagnostic(code(docsmith::embedding))]
    Embedding(String),

    /// Persistence-layer failure.
    #[error("database error: {0}")]
    #[diagnostic(code(docsmith::database))]
    Database(String),

    /// Resume was requested for a document id that does not exist.
    #[error("document {0} not found")]
    #[diagnostic(
        code(docsmith::document_not_found),
        help("The document may have been deleted; start a fresh ingestion instead.")
    )]
    DocumentNotFound(i64),

    /// Stored rows do not match the expected schema.
    #[error("schema validation failed: {0}")]
    #[diagnostic(code(docsmith::schema_validation))]
    SchemaValidation(String),

    /// HTTP transport error from an external collaborator.
    #[error(transparent)]
    #[diagnostic(code(docsmith::http))]
    Http(#[from] reqwest::Error),

    /// Filesystem error (PDF reads, cache files).
    #[error(transparent)]
    #[diagnostic(code(docsmith::io))]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error(transparent)]
    #[diagnostic(code(docsmith::serde_json))]
    Json(#[from] serde_json::Error),

    /// SQLite error from the document repository.
    #[error(transparent)]
    #[diagnostic(code(docsmith::sqlite))]
    Sqlite(#[from] tokio_rusqlite::Error),
}
