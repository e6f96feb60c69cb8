//! Orchestrator-workers: plan, execute a dependency graph, synthesize.
//!
//! ```text
//!   task description
//!         │
//!         ▼
//!   ┌───────────┐   Vec<Subtask>   ┌─────────────┐  per task  ┌────────┐
//!   │  Planner  │ ───────────────▶ │  Scheduler  │ ─────────▶ │ Worker │
//!   └───────────┘                  └──────┬──────┘ ◀───────── └────────┘
//!                                         │        TaskOutcome
//!                                         ▼ OutcomeSet
//!                                  ┌─────────────┐
//!                                  │ Synthesizer │ ──▶ final answer
//!                                  └─────────────┘
//! ```
//!
//! A planning failure or an unresolvable dependency aborts the run before
//! any further oracle call. A subtask whose reply cannot be parsed becomes a
//! failed outcome and the run continues; the synthesizer is told about it.

mod error;
mod planner;
mod scheduler;
mod synthesizer;
mod worker;

pub use error::{CircularDependencyError, OrchestratorError, PlanningError};
pub use planner::{Plan, Planner};
pub use scheduler::{DispatchMode, Scheduler};
pub use synthesizer::Synthesizer;
pub use worker::Worker;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::oracle::SharedOracle;
use crate::task::{OutcomeSet, TaskOutcome};

/// Everything a caller gets back from [`Orchestrator::process_task`].
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationResult {
    pub final_result: String,
    pub subtask_results: OutcomeSet,
    /// The planner's explanation of the breakdown
    pub task_breakdown: Option<String>,
}

impl OrchestrationResult {
    pub fn failed_subtasks(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.subtask_results.values().filter(|o| !o.is_completed())
    }
}

pub struct Orchestrator {
    planner: Planner,
    scheduler: Scheduler,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    /// Orchestrator dispatching one subtask at a time.
    pub fn new(oracle: SharedOracle) -> Self {
        Self::with_dispatch_mode(oracle, DispatchMode::Sequential)
    }

    pub fn with_dispatch_mode(oracle: SharedOracle, mode: DispatchMode) -> Self {
        Self {
            planner: Planner::new(oracle.clone()),
            scheduler: Scheduler::new(Worker::new(oracle.clone()), mode),
            synthesizer: Synthesizer::new(oracle),
        }
    }

    pub async fn process_task(&self, task: &str) -> Result<OrchestrationResult, OrchestratorError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("process_task", %run_id);

        async move {
            tracing::info!("Planning subtasks");
            let plan = self.planner.plan(task).await?;

            tracing::info!(mode = ?self.scheduler.mode(), "Executing {} subtasks", plan.tasks.len());
            let outcomes = self.scheduler.execute(plan.tasks).await?;

            tracing::info!("Synthesizing {} results", outcomes.len());
            let final_result = self.synthesizer.synthesize(&outcomes).await?;

            Ok(OrchestrationResult {
                final_result,
                subtask_results: outcomes,
                task_breakdown: plan.rationale,
            })
        }
        .instrument(span)
        .await
    }
}
