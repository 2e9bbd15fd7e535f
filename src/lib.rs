//! # Docsmith: Document Ingestion Pipeline
//!
//! Docsmith turns source documents (web pages, PDFs) into retrieval-sized,
//! metadata-rich chunks and persists them alongside their vector-store
//! entries. Execution is organized as a DAG of idempotent stages over an
//! immutable context, so a run can fail partway and be resumed without
//! redoing finished work.
//!
//! ## Core Concepts
//!
//! - **Stages**: Async units of work (`parsing`, `chunking`, `embedding`,
//!   `persistence`) that declare dependencies by name
//! - **Context**: Immutable value threaded through stages; every transition
//!   produces a new context
//! - **Orchestrator**: Validates the stage DAG and executes in topological
//!   order, continuing past failed stages
//! - **Chunking engine**: Four passes (structural split, semantic resplit,
//!   small-chunk merge, finalize) over markdown
//! - **Resource cache**: Per-key locked lazy loading of embedder handles
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docsmith::config::Settings;
//! use docsmith::embedding::{HttpEmbedderFactory, VectorStoreManager};
//! use docsmith::parsers::ParserFactory;
//! use docsmith::repository::SqliteRepository;
//! use docsmith::runner::IngestionRunner;
//! # use docsmith::embedding::{VectorEntry, VectorStore};
//! # use docsmith::errors::IngestError;
//! # struct MyStore;
//! # #[async_trait::async_trait]
//! # impl VectorStore for MyStore {
//! #     async fn add_chunks(&self, e: &[VectorEntry]) -> Result<Vec<String>, IngestError> {
//! #         Ok(e.iter().map(|x| x.id.clone()).collect())
//! #     }
//! # }
//!
//! # async fn run() -> Result<(), docsmith::errors::IngestError> {
//! let settings = Settings::from_env()?;
//! let repository = Arc::new(SqliteRepository::open(&settings.database.url).await?);
//! let runner = IngestionRunner::new(
//!     repository,
//!     Arc::new(ParserFactory::new(&settings.parsing)),
//!     Arc::new(VectorStoreManager::new(
//!         Arc::new(MyStore),
//!         settings.embedding.batch_size,
//!     )),
//!     Arc::new(HttpEmbedderFactory::new(settings.embedding.clone())),
//!     settings.chunking.clone(),
//! )?;
//!
//! let report = runner.process("https://example.com/handbook", None).await?;
//! println!("document {} -> {} chunks", report.document_id, report.chunk_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`context`] - Pipeline context and stage status
//! - [`stage`] - The [`Stage`](stage::Stage) trait
//! - [`orchestrator`] - DAG validation and ordered execution
//! - [`stages`] - The four built-in stages
//! - [`chunking`] - The four-pass chunking engine
//! - [`cache`] - Keyed lazy resource cache
//! - [`parsers`] - URL and PDF parsers
//! - [`embedding`] - Embedder and vector-store capabilities
//! - [`repository`] - Relational persistence
//! - [`runner`] - High-level ingestion entry point
//! - [`config`] - Environment-driven settings
//! - [`telemetry`] - Tracing initialization

pub mod cache;
pub mod chunking;
pub mod config;
pub mod context;
pub mod embedding;
pub mod errors;
pub mod orchestrator;
pub mod parsers;
pub mod repository;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod telemetry;
