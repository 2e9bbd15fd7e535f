//! Stage contract for pipeline execution.
//!
//! A [`Stage`] is one named unit of pipeline work with a declared dependency
//! set. Stages receive a [`PipelineContext`] and return an updated context
//! whose own status has been set to completed or failed, never left at
//! running or pending.
//!
//! # Error handling
//!
//! Expected (domain) failures must be caught inside `execute` and encoded via
//! [`PipelineContext::mark_stage_failed`], returning `Ok`. Returning `Err` is
//! reserved for unexpected failures; the orchestrator catches those and folds
//! them into the context the same way, so no stage failure ever escapes a
//! pipeline run.

use async_trait::async_trait;

use crate::context::{PipelineContext, StageStatus};
use crate::errors::IngestError;

/// One named unit of pipeline work with declared dependencies.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique, stable identifier for this stage.
    fn name(&self) -> &'static str;

    /// Names of stages that must be completed before this stage may run.
    fn required_stages(&self) -> &[&'static str] {
        &[]
    }

    /// True iff every required stage has status `Completed`.
    fn can_run(&self, context: &PipelineContext) -> bool {
        self.required_stages()
            .iter()
            .all(|dep| context.stage_status(dep) == Some(StageStatus::Completed))
    }

    /// True iff this stage's own status is already `Completed`.
    fn should_skip(&self, context: &PipelineContext) -> bool {
        context.stage_status(self.name()) == Some(StageStatus::Completed)
    }

    /// Performs the stage's work and returns the updated context.
    async fn execute(&self, context: PipelineContext) -> Result<PipelineContext, IngestError>;
}
