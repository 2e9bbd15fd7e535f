//! DAG-based pipeline orchestration.
//!
//! [`PipelineOrchestrator`] validates the stage dependency graph at
//! construction (cycle detection + topological ordering) and drives
//! sequential execution across stages, handling skip/defer/fail logic.
//!
//! Execution is deliberately failure-tolerant: a failed stage is recorded in
//! the context and the pass continues, so one run reports the full set of
//! failures instead of aborting at the first one. Combined with the
//! skip-if-completed contract this makes re-invocation on a stored context a
//! safe way to resume after a transient fault.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::context::{PipelineContext, StageStatus};
use crate::errors::IngestError;
use crate::stage::Stage;

/// Validates stage wiring and executes stages in dependency order.
pub struct PipelineOrchestrator {
    stages: Vec<Arc<dyn Stage>>,
    execution_order: Vec<usize>,
    max_passes: usize,
    stage_timeout: Option<Duration>,
}

impl PipelineOrchestrator {
    /// Builds an orchestrator over the given stages.
    ///
    /// The order stages are supplied in is irrelevant to execution order
    /// except as a deterministic tie-break between independent stages; only
    /// dependency edges matter.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::CyclicDependency`] when the `required_stages`
    /// edges form a cycle. This runs once here, not per execution.
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self, IngestError> {
        detect_cycles(&stages)?;
        let execution_order = topological_order(&stages)?;

        debug!(
            order = ?execution_order
                .iter()
                .map(|&i| stages[i].name())
                .collect::<Vec<_>>(),
            "pipeline execution order computed"
        );

        Ok(Self {
            stages,
            execution_order,
            max_passes: 1,
            stage_timeout: None,
        })
    }

    /// Repeats the ordered pass up to `passes` times within one `execute`
    /// call, stopping early once a pass produces no status transition.
    ///
    /// The default of 1 performs a single pass; progress past a stage that
    /// failed mid-pass then requires a fresh `execute` invocation.
    #[must_use]
    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }

    /// Bounds each stage execution with a timeout; an elapsed timer is folded
    /// into the context as a stage failure. No timeout by default.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Stage names in computed execution order.
    pub fn execution_order(&self) -> Vec<&'static str> {
        self.execution_order
            .iter()
            .map(|&i| self.stages[i].name())
            .collect()
    }

    /// Executes the pipeline over `context`, returning the final context.
    ///
    /// Never returns an error for stage failures: both domain failures a
    /// stage recorded itself and unexpected `Err` returns are folded into the
    /// context, and execution continues with the next stage.
    pub async fn execute(&self, context: PipelineContext) -> PipelineContext {
        let mut current = context;

        for pass in 0..self.max_passes {
            let before = current.stage_results.clone();
            current = self.execute_pass(current).await;
            if current.stage_results == before {
                break;
            }
            if pass + 1 < self.max_passes {
                debug!(pass = pass + 1, "pipeline pass made progress, repeating");
            }
        }

        current
    }

    async fn execute_pass(&self, mut current: PipelineContext) -> PipelineContext {
        for &idx in &self.execution_order {
            let stage = &self.stages[idx];
            let name = stage.name();

            if stage.should_skip(&current) {
                info!(stage = name, "skipping stage (already completed)");
                continue;
            }

            if !stage.can_run(&current) {
                let missing: Vec<&str> = stage
                    .required_stages()
                    .iter()
                    .copied()
                    .filter(|dep| current.stage_status(dep) != Some(StageStatus::Completed))
                    .collect();
                warn!(stage = name, ?missing, "stage cannot run, deferring");
                continue;
            }

            info!(stage = name, "executing stage");
            let result = match self.stage_timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, stage.execute(current.clone())).await {
                        Ok(result) => result,
                        Err(_) => Err(IngestError::Pipeline(format!(
                            "stage '{name}' timed out after {timeout:?}"
                        ))),
                    }
                }
                None => stage.execute(current.clone()).await,
            };

            match result {
                Ok(next) => {
                    current = next;
                    if current.stage_status(name) == Some(StageStatus::Failed) {
                        let message = current
                            .error_messages
                            .get(name)
                            .map(String::as_str)
                            .unwrap_or("unknown error");
                        error!(stage = name, error = message, "stage failed");
                        // Continue: independent stages may still run and the
                        // caller sees the full failure report in one pass.
                    }
                }
                Err(err) => {
                    error!(stage = name, error = %err, "unexpected error in stage");
                    current = current.mark_stage_failed(name, err.to_string());
                }
            }
        }

        current
    }
}

/// Depth-first cycle detection over the `required_stages` graph.
fn detect_cycles(stages: &[Arc<dyn Stage>]) -> Result<(), IngestError> {
    let by_name: FxHashMap<&str, &Arc<dyn Stage>> =
        stages.iter().map(|s| (s.name(), s)).collect();

    fn visit<'a>(
        name: &'a str,
        by_name: &FxHashMap<&'a str, &'a Arc<dyn Stage>>,
        visited: &mut Vec<&'a str>,
        in_progress: &mut Vec<&'a str>,
    ) -> Option<String> {
        visited.push(name);
        in_progress.push(name);

        if let Some(stage) = by_name.get(name) {
            for &dep in stage.required_stages() {
                if in_progress.contains(&dep) {
                    return Some(format!("{name} -> {dep}"));
                }
                if !visited.contains(&dep)
                    && let Some(cycle) = visit(dep, by_name, visited, in_progress)
                {
                    return Some(cycle);
                }
            }
        }

        in_progress.retain(|n| n != &name);
        None
    }

    let mut visited = Vec::new();
    for stage in stages {
        let name = stage.name();
        if !visited.contains(&name) {
            let mut in_progress = Vec::new();
            if let Some(cycle) = visit(name, &by_name, &mut visited, &mut in_progress) {
                return Err(IngestError::CyclicDependency(cycle));
            }
        }
    }

    debug!("DAG validation passed, no cycles detected");
    Ok(())
}

/// Kahn's algorithm over `required_stages` edges.
///
/// Each dependency precedes every stage that requires it; ties between
/// independent stages are broken by the original input order so execution is
/// deterministic. Dependencies naming no registered stage are ignored here
/// (they keep `can_run` false forever, matching the defer semantics).
fn topological_order(stages: &[Arc<dyn Stage>]) -> Result<Vec<usize>, IngestError> {
    let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
    let mut unmet: Vec<usize> = stages
        .iter()
        .map(|s| {
            s.required_stages()
                .iter()
                .filter(|&&dep| names.contains(&dep))
                .count()
        })
        .collect();

    let mut order = Vec::with_capacity(stages.len());
    let mut placed = vec![false; stages.len()];

    while order.len() < stages.len() {
        // First input-order stage with all dependencies placed.
        let Some(next) = (0..stages.len()).find(|&i| !placed[i] && unmet[i] == 0) else {
            // Unreachable when cycle detection passed.
            return Err(IngestError::Pipeline(
                "unable to determine stage execution order".into(),
            ));
        };

        placed[next] = true;
        order.push(next);

        for (i, stage) in stages.iter().enumerate() {
            if !placed[i] && stage.required_stages().contains(&names[next]) {
                unmet[i] = unmet[i].saturating_sub(1);
            }
        }
    }

    Ok(order)
}
