//! Chunk stage: markdown in, finalized chunks out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::cache::ResourceCache;
use crate::chunking::{ChunkingConfig, MarkdownChunker};
use crate::context::PipelineContext;
use crate::embedding::{Embedder, EmbedderFactory};
use crate::errors::IngestError;
use crate::stage::Stage;
use crate::stages::{CHUNKING, PARSING};

/// Runs the four-pass chunking engine over the parsed markdown.
///
/// The embedder for the semantic pass is obtained through the shared
/// [`ResourceCache`], so repeated runs with the same model reuse one handle.
/// An embedder load failure fails this stage rather than the whole run.
pub struct ChunkingStage {
    config: ChunkingConfig,
    cache: Arc<ResourceCache<dyn Embedder>>,
    factory: Arc<dyn EmbedderFactory>,
}

impl ChunkingStage {
    pub fn new(
        config: ChunkingConfig,
        cache: Arc<ResourceCache<dyn Embedder>>,
        factory: Arc<dyn EmbedderFactory>,
    ) -> Self {
        Self {
            config,
            cache,
            factory,
        }
    }

    async fn embedder(&self) -> Result<Option<Arc<dyn Embedder>>, IngestError> {
        if !self.config.enable_semantic {
            return Ok(None);
        }
        let model = &self.config.model;
        let handle = self
            .cache
            .get_or_load(model, || self.factory.load(model))
            .await?;
        Ok(Some(handle))
    }
}

#[async_trait]
impl Stage for ChunkingStage {
    fn name(&self) -> &'static str {
        CHUNKING
    }

    fn required_stages(&self) -> &[&'static str] {
        &[PARSING]
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        let Some(content) = ctx.parsed_content.clone() else {
            return Ok(ctx.mark_stage_failed(CHUNKING, "no parsed content available for chunking"));
        };

        info!(title = ?ctx.title, "chunking document");

        let embedder = match self.embedder().await {
            Ok(embedder) => embedder,
            Err(err) => {
                error!(model = %self.config.model, error = %err, "embedder load failed");
                return Ok(
                    ctx.mark_stage_failed(CHUNKING, format!("embedder load failed: {err}"))
                );
            }
        };

        let outcome = async {
            let chunker =
                MarkdownChunker::new(content, self.config.clone(), ctx.title.clone(), embedder)?;
            chunker.chunk().await
        }
        .await;

        match outcome {
            Ok((chunks, stats)) => {
                info!(
                    chunks = stats.total_chunks,
                    avg_words = format!("{:.0}", stats.avg_chunk_size),
                    elapsed_s = format!("{:.2}", stats.processing_time),
                    "chunking stage complete"
                );
                Ok(ctx.with_chunks(chunks).mark_stage_completed(CHUNKING))
            }
            Err(err) => {
                error!(error = %err, "chunking failed");
                Ok(ctx.mark_stage_failed(CHUNKING, err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageStatus;

    struct UnavailableFactory;

    #[async_trait]
    impl EmbedderFactory for UnavailableFactory {
        async fn load(&self, _model: &str) -> Result<Arc<dyn Embedder>, IngestError> {
            Err(IngestError::Configuration("no api key".into()))
        }
    }

    fn stage(enable_semantic: bool) -> ChunkingStage {
        ChunkingStage::new(
            ChunkingConfig {
                enable_semantic,
                ..Default::default()
            },
            Arc::new(ResourceCache::new()),
            Arc::new(UnavailableFactory),
        )
    }

    #[tokio::test]
    async fn missing_content_fails_the_stage() {
        let out = stage(false)
            .execute(PipelineContext::for_source("x"))
            .await
            .unwrap();
        assert_eq!(out.stage_status(CHUNKING), Some(StageStatus::Failed));
    }

    #[tokio::test]
    async fn chunks_without_embedder_when_semantic_disabled() {
        let ctx = PipelineContext::for_source("x")
            .with_parsed(format!("# T\n\n{}", "word ".repeat(100)), None);
        let out = stage(false).execute(ctx).await.unwrap();
        assert_eq!(out.stage_status(CHUNKING), Some(StageStatus::Completed));
        assert!(!out.chunks.is_empty());
    }

    #[tokio::test]
    async fn embedder_load_failure_is_a_chunking_failure() {
        let ctx = PipelineContext::for_source("x").with_parsed("# T\n\nbody".into(), None);
        let out = stage(true).execute(ctx).await.unwrap();
        assert_eq!(out.stage_status(CHUNKING), Some(StageStatus::Failed));
        assert!(out.error_messages[CHUNKING].contains("embedder load failed"));
    }
}
