//! Persist stage: writes markdown and chunk rows, completes the document.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::context::PipelineContext;
use crate::errors::IngestError;
use crate::repository::{ChunkRow, DocumentRepository, DocumentStatus};
use crate::stage::Stage;
use crate::stages::{EMBEDDING, PERSISTENCE};

/// Persists the run's output: document markdown, chunk rows keyed by the
/// UUIDs the embed stage generated, document status `completed`. The chunk
/// payload is dropped from the context afterwards.
pub struct PersistenceStage {
    repository: Arc<dyn DocumentRepository>,
}

impl PersistenceStage {
    pub fn new(repository: Arc<dyn DocumentRepository>) -> Self {
        Self { repository }
    }

    async fn persist(&self, ctx: &PipelineContext, document_id: i64) -> Result<(), IngestError> {
        if let Some(markdown) = &ctx.parsed_content {
            self.repository.update_markdown(document_id, markdown).await?;
        }

        let rows: Result<Vec<ChunkRow>, IngestError> = ctx
            .chunks
            .iter()
            .zip(&ctx.chunk_ids)
            .enumerate()
            .map(|(index, (chunk, uuid))| {
                Ok(ChunkRow {
                    uuid: uuid.clone(),
                    chunk_index: chunk.metadata.chunk_index.unwrap_or(index),
                    text: chunk.text.clone(),
                    metadata: serde_json::to_value(&chunk.metadata)?,
                })
            })
            .collect();
        self.repository.insert_chunks(document_id, &rows?).await?;

        self.repository.clear_chunk_blob(document_id).await?;
        self.repository
            .update_status(document_id, DocumentStatus::Completed, None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Stage for PersistenceStage {
    fn name(&self) -> &'static str {
        PERSISTENCE
    }

    fn required_stages(&self) -> &[&'static str] {
        &[EMBEDDING]
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        let Some(document_id) = ctx.document_id else {
            return Ok(ctx.mark_stage_failed(PERSISTENCE, "no document id in context"));
        };

        if ctx.chunk_ids.len() != ctx.chunks.len() {
            let message = format!(
                "chunk id count ({}) does not match chunk count ({})",
                ctx.chunk_ids.len(),
                ctx.chunks.len()
            );
            return Ok(ctx.mark_stage_failed(PERSISTENCE, message));
        }

        info!(document_id, chunks = ctx.chunks.len(), "persisting document");
        match self.persist(&ctx, document_id).await {
            Ok(()) => {
                info!(document_id, "document persisted");
                Ok(ctx.without_chunks().mark_stage_completed(PERSISTENCE))
            }
            Err(err) => {
                error!(document_id, error = %err, "persistence failed");
                Ok(ctx.mark_stage_failed(PERSISTENCE, err.to_string()))
            }
        }
    }
}
