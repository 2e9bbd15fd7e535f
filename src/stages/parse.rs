//! Parse stage: source locator in, markdown out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::context::PipelineContext;
use crate::errors::IngestError;
use crate::parsers::ParserFactory;
use crate::stage::Stage;
use crate::stages::PARSING;

/// Turns `context.source` into markdown via the parser factory.
pub struct ParsingStage {
    factory: Arc<ParserFactory>,
}

impl ParsingStage {
    pub fn new(factory: Arc<ParserFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl Stage for ParsingStage {
    fn name(&self) -> &'static str {
        PARSING
    }

    async fn execute(&self, ctx: PipelineContext) -> Result<PipelineContext, IngestError> {
        let Some(source) = ctx.source.clone() else {
            return Ok(ctx.mark_stage_failed(PARSING, "no source provided in context"));
        };

        info!(source, "parsing source");
        match self.factory.parse(&source).await {
            Ok(result) => {
                info!(source, title = ?result.title, "source parsed");
                Ok(ctx
                    .with_parsed(result.content, result.title)
                    .mark_stage_completed(PARSING))
            }
            Err(err) => {
                error!(source, error = %err, "parsing failed");
                Ok(ctx.mark_stage_failed(PARSING, err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageStatus;
    use crate::parsers::ParsingSettings;

    #[tokio::test]
    async fn missing_source_fails_the_stage() {
        let stage = ParsingStage::new(Arc::new(ParserFactory::new(&ParsingSettings::default())));
        let out = stage.execute(PipelineContext::default()).await.unwrap();
        assert_eq!(out.stage_status(PARSING), Some(StageStatus::Failed));
    }

    #[tokio::test]
    async fn unsupported_source_fails_the_stage() {
        let stage = ParsingStage::new(Arc::new(ParserFactory::new(&ParsingSettings::default())));
        let out = stage
            .execute(PipelineContext::for_source("notes.docx"))
            .await
            .unwrap();
        assert_eq!(out.stage_status(PARSING), Some(StageStatus::Failed));
        assert!(out.error_messages[PARSING].contains("no parser available"));
    }
}
