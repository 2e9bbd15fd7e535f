//! High-level ingestion entry point composing the pipeline.
//!
//! [`IngestionRunner`] owns the collaborators (repository, parser factory,
//! vector store manager, embedder cache), creates or resumes the document
//! row, runs one orchestrated pipeline pass, and reconciles the document's
//! stored status with the outcome.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::cache::ResourceCache;
use crate::chunking::ChunkingConfig;
use crate::context::{PipelineContext, StageStatus};
use crate::embedding::{Embedder, EmbedderFactory, VectorStoreManager};
use crate::errors::IngestError;
use crate::orchestrator::PipelineOrchestrator;
use crate::parsers::ParserFactory;
use crate::repository::{DocumentRepository, DocumentStatus};
use crate::stage::Stage;
use crate::stages::{
    CHUNKING, ChunkingStage, EMBEDDING, EmbeddingStage, PERSISTENCE, ParsingStage,
    PersistenceStage,
};

/// What to ingest: a fresh source locator or an existing document to resume.
#[derive(Clone, Debug)]
pub enum SourceRef {
    /// URL or file path.
    Locator(String),
    /// Database id of a previously created document.
    Resume(i64),
}

impl From<&str> for SourceRef {
    fn from(locator: &str) -> Self {
        Self::Locator(locator.to_string())
    }
}

impl From<i64> for SourceRef {
    fn from(id: i64) -> Self {
        Self::Resume(id)
    }
}

/// Outcome summary of one ingestion run.
#[derive(Clone, Debug)]
pub struct IngestionReport {
    pub document_id: i64,
    pub source: String,
    pub title: Option<String>,
    pub chunk_count: usize,
    pub stage_results: FxHashMap<String, StageStatus>,
    pub errors: FxHashMap<String, String>,
    /// True when the persistence stage completed.
    pub success: bool,
}

/// Composes and drives the four-stage ingestion pipeline.
pub struct IngestionRunner {
    repository: Arc<dyn DocumentRepository>,
    parser_factory: Arc<ParserFactory>,
    vector_store: Arc<VectorStoreManager>,
    embedder_factory: Arc<dyn EmbedderFactory>,
    embedder_cache: Arc<ResourceCache<dyn Embedder>>,
    chunking_config: ChunkingConfig,
}

impl IngestionRunner {
    /// # Errors
    ///
    /// [`IngestError::Configuration`] when the chunking config is invalid.
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        parser_factory: Arc<ParserFactory>,
        vector_store: Arc<VectorStoreManager>,
        embedder_factory: Arc<dyn EmbedderFactory>,
        chunking_config: ChunkingConfig,
    ) -> Result<Self, IngestError> {
        chunking_config.validate()?;
        Ok(Self {
            repository,
            parser_factory,
            vector_store,
            embedder_factory,
            embedder_cache: Arc::new(ResourceCache::new()),
            chunking_config,
        })
    }

    /// The shared embedder cache, exposed for warm-up and inspection.
    pub fn embedder_cache(&self) -> &Arc<ResourceCache<dyn Embedder>> {
        &self.embedder_cache
    }

    /// Processes one document end to end.
    ///
    /// # Errors
    ///
    /// Fatal setup errors only: unknown resume id, a resumed document without
    /// a source locator, or invalid stage wiring. Stage failures are reported
    /// through the returned [`IngestionReport`], not as `Err`.
    pub async fn process(
        &self,
        source: impl Into<SourceRef>,
        title: Option<String>,
    ) -> Result<IngestionReport, IngestError> {
        let (document_id, source, title) = self.resolve(source.into(), title).await?;

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(ParsingStage::new(Arc::clone(&self.parser_factory))),
            Arc::new(ChunkingStage::new(
                self.chunking_config.clone(),
                Arc::clone(&self.embedder_cache),
                Arc::clone(&self.embedder_factory),
            )),
            Arc::new(EmbeddingStage::new(Arc::clone(&self.vector_store))),
            Arc::new(PersistenceStage::new(Arc::clone(&self.repository))),
        ];
        let pipeline = PipelineOrchestrator::new(stages)?;

        let mut ctx = PipelineContext::for_source(&source).with_document_id(document_id);
        if let Some(title) = &title {
            ctx = ctx.with_title(title.clone());
        }

        info!(document_id, source, "starting ingestion pipeline");
        let final_ctx = pipeline.execute(ctx).await;

        let success = final_ctx.stage_status(PERSISTENCE) == Some(StageStatus::Completed);
        if success {
            info!(document_id, "ingestion pipeline completed");
        } else {
            self.record_partial_outcome(document_id, &final_ctx).await?;
        }

        let chunk_count = final_ctx.chunk_ids.len().max(final_ctx.chunks.len());
        Ok(IngestionReport {
            document_id,
            source,
            title: final_ctx.title.clone(),
            chunk_count,
            stage_results: final_ctx.stage_results,
            errors: final_ctx.error_messages,
            success,
        })
    }

    /// Resolves a [`SourceRef`] into `(document_id, source, title)`, creating
    /// or loading the document row.
    async fn resolve(
        &self,
        source: SourceRef,
        title: Option<String>,
    ) -> Result<(i64, String, Option<String>), IngestError> {
        match source {
            SourceRef::Resume(id) => {
                let doc = self
                    .repository
                    .get_document(id)
                    .await?
                    .ok_or(IngestError::DocumentNotFound(id))?;
                let source = doc.file_path.ok_or_else(|| {
                    IngestError::Pipeline(format!(
                        "document {id} has no source locator and cannot be resumed"
                    ))
                })?;
                info!(document_id = id, title = %doc.title, "resuming document");
                Ok((id, source, Some(doc.title)))
            }
            SourceRef::Locator(source) => {
                let id = self
                    .repository
                    .create_document(
                        title.as_deref().unwrap_or("Untitled"),
                        Some(&source),
                        DocumentStatus::Pending,
                    )
                    .await?;
                info!(document_id = id, source, "created document");
                Ok((id, source, title))
            }
        }
    }

    /// Marks the document failed with the collected stage errors. When
    /// chunking succeeded but embedding did not, the chunk payload is stored
    /// on the document row so a resumed run can pick it up.
    async fn record_partial_outcome(
        &self,
        document_id: i64,
        ctx: &PipelineContext,
    ) -> Result<(), IngestError> {
        let mut errors: Vec<String> = ctx
            .error_messages
            .iter()
            .map(|(stage, msg)| format!("{stage}: {msg}"))
            .collect();
        errors.sort();
        let details = if errors.is_empty() {
            "pipeline did not complete".to_string()
        } else {
            errors.join("; ")
        };

        warn!(document_id, details, "ingestion pipeline partially completed");
        self.repository
            .update_status(document_id, DocumentStatus::Failed, Some(&details))
            .await?;

        if ctx.stage_status(CHUNKING) == Some(StageStatus::Completed)
            && ctx.stage_status(EMBEDDING) == Some(StageStatus::Failed)
            && !ctx.chunks.is_empty()
        {
            let blob = serde_json::to_value(&ctx.chunks)?;
            self.repository.store_chunk_blob(document_id, &blob).await?;
            info!(
                document_id,
                chunks = ctx.chunks.len(),
                "chunk payload stored for resume"
            );
        }
        Ok(())
    }
}
