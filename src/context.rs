//! Immutable pipeline context threaded through stage execution.
//!
//! [`PipelineContext`] is a value type: every transition produces a new
//! context and the caller replaces its reference, so no aliasing can occur
//! between the context a stage receives and the one it returns. This keeps
//! re-entry safe (a context loaded from storage can be re-run) and makes the
//! orchestrator loop referentially transparent for testing.
//!
//! # Examples
//!
//! ```rust
//! use docsmith::context::{PipelineContext, StageStatus};
//!
//! let ctx = PipelineContext::for_source("https://example.com/doc");
//! let ctx = ctx.mark_stage_running("parsing");
//! let ctx = ctx
//!     .with_parsed("# Title\n\nBody".into(), Some("Title".into()))
//!     .mark_stage_completed("parsing");
//!
//! assert_eq!(ctx.stage_status("parsing"), Some(StageStatus::Completed));
//! assert_eq!(ctx.title.as_deref(), Some("Title"));
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;

/// Execution status of a single pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

/// Immutable carrier of pipeline state and per-stage status/errors.
///
/// Invariant: a stage name appears in `stage_results` only after that stage
/// has been attempted (marked running, completed, or failed).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineContext {
    /// Database id of the document being processed; `None` until persistence
    /// (or the runner) assigns one.
    pub document_id: Option<i64>,
    /// Original locator (URL or file path). Set once, never changed.
    pub source: Option<String>,
    /// Markdown content produced by the parse stage.
    pub parsed_content: Option<String>,
    /// Document title, explicit or extracted during parsing.
    pub title: Option<String>,
    /// Finalized chunks produced by the chunk stage; consumed and cleared by
    /// the persistence stage.
    pub chunks: Vec<Chunk>,
    /// UUID join keys generated by the embedding stage, aligned with
    /// `chunks` by position. Carried unchanged into persistence.
    pub chunk_ids: Vec<String>,
    /// Per-stage execution status; the only state the orchestrator reads to
    /// decide control flow.
    pub stage_results: FxHashMap<String, StageStatus>,
    /// Last error text recorded for each failed stage.
    pub error_messages: FxHashMap<String, String>,
}

impl PipelineContext {
    /// Creates a fresh context for the given source locator.
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// Status of a stage, if it has been attempted.
    pub fn stage_status(&self, stage: &str) -> Option<StageStatus> {
        self.stage_results.get(stage).copied()
    }

    /// Returns a new context with the document id set.
    #[must_use]
    pub fn with_document_id(mut self, id: i64) -> Self {
        self.document_id = Some(id);
        self
    }

    /// Returns a new context with parsed content and (optionally) a title.
    #[must_use]
    pub fn with_parsed(mut self, content: String, title: Option<String>) -> Self {
        self.parsed_content = Some(content);
        if title.is_some() {
            self.title = title;
        }
        self
    }

    /// Returns a new context with the title replaced.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Returns a new context carrying the finalized chunks.
    #[must_use]
    pub fn with_chunks(mut self, chunks: Vec<Chunk>) -> Self {
        self.chunks = chunks;
        self
    }

    /// Returns a new context carrying the chunk UUID join keys.
    #[must_use]
    pub fn with_chunk_ids(mut self, ids: Vec<String>) -> Self {
        self.chunk_ids = ids;
        self
    }

    /// Returns a new context with the chunk payload dropped (persistence has
    /// consumed it).
    #[must_use]
    pub fn without_chunks(mut self) -> Self {
        self.chunks = Vec::new();
        self
    }

    /// Returns a new context with `stage` marked as running.
    #[must_use]
    pub fn mark_stage_running(mut self, stage: &str) -> Self {
        self.stage_results
            .insert(stage.to_string(), StageStatus::Running);
        self
    }

    /// Returns a new context with `stage` marked as completed.
    #[must_use]
    pub fn mark_stage_completed(mut self, stage: &str) -> Self {
        self.stage_results
            .insert(stage.to_string(), StageStatus::Completed);
        self
    }

    /// Returns a new context with `stage` marked as failed and the error
    /// message recorded.
    #[must_use]
    pub fn mark_stage_failed(mut self, stage: &str, error: impl Into<String>) -> Self {
        self.stage_results
            .insert(stage.to_string(), StageStatus::Failed);
        self.error_messages.insert(stage.to_string(), error.into());
        self
    }
}
