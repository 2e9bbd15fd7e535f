//! Embed stage: assigns UUID join keys and submits chunks to the vector store.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::PipelineContext;
use crate::embedding::{VectorEntry, VectorStoreManager};
use crate::errors::IngestError;
use crate::stage::Stage;
use crate::stages::{CHUNKING, EMBEDDING};

/// Embeds the context's chunks into the vector store.
///
/// One UUIDv4 per chunk is generated *before* submission and recorded in the
/// context; persistence reuses the same ids for the relational rows, which is
/// what makes the two stores joinable.
pub struct EmbeddingStage {
    manager: Arc<VectorStoreManager>,
}

impl EmbeddingStage {
    pub fn new(manager: Arc<VectorStoreManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Stage for EmbeddingStage {
    fn name(&self) -> &'static str {
        EMBEDDING
    }

    fn required_stages(&self) -> &[&'static str] {
        &[CHUNKING]
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        if ctx.chunks.is_empty() {
            return Ok(ctx.mark_stage_failed(EMBEDDING, "no chunks available for embedding"));
        }

        info!(chunks = ctx.chunks.len(), "embedding chunks");

        let ids: Vec<String> = ctx.chunks.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let entries: Result<Vec<VectorEntry>, IngestError> = ctx
            .chunks
            .iter()
            .zip(&ids)
            .map(|(chunk, id)| {
                let mut metadata = serde_json::to_value(&chunk.metadata)?;
                if let Some(map) = metadata.as_object_mut() {
                    map.insert("document_id".into(), json!(ctx.document_id));
                }
                Ok(VectorEntry {
                    id: id.clone(),
                    text: chunk.text.clone(),
                    metadata,
                })
            })
            .collect();
        let entries = entries?;

        match self.manager.embed_documents(&entries).await {
            Ok(stored) if stored.is_empty() => {
                error!(submitted = entries.len(), "no chunks were stored");
                Ok(ctx.mark_stage_failed(
                    EMBEDDING,
                    "vector store rejected every batch; no chunks were stored",
                ))
            }
            Ok(stored) => {
                if stored.len() != entries.len() {
                    warn!(
                        submitted = entries.len(),
                        stored = stored.len(),
                        "embedding count mismatch"
                    );
                }
                Ok(ctx.with_chunk_ids(ids).mark_stage_completed(EMBEDDING))
            }
            Err(err) => {
                error!(error = %err, "embedding failed");
                Ok(ctx.mark_stage_failed(EMBEDDING, err.to_string()))
            }
        }
    }
}
