//! Dependency-driven execution of a task set.
//!
//! Tasks move from `pending` to `completed` in waves. A wave is every
//! pending task whose dependencies all have an outcome at the start of the
//! pass, in task-set order. Failed outcomes count as resolved, so a failure
//! never blocks its dependents. An empty wave with work still pending means
//! the remaining graph cannot make progress and the run is aborted.

use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;

use super::error::{CircularDependencyError, OrchestratorError};
use super::planner::ensure_unique_ids;
use super::worker::Worker;
use crate::oracle::OracleError;
use crate::task::{OutcomeSet, Subtask, TaskOutcome};

/// How the tasks of one wave are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One task at a time, in task-set order.
    #[default]
    Sequential,
    /// Up to `max_workers` tasks of a wave in flight at once. Outcomes are
    /// recorded only after the whole wave has finished.
    Concurrent { max_workers: usize },
}

pub struct Scheduler {
    worker: Worker,
    mode: DispatchMode,
}

impl Scheduler {
    pub fn new(worker: Worker, mode: DispatchMode) -> Self {
        Self { worker, mode }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run every task once its dependencies are resolved.
    ///
    /// Returns outcomes keyed by task id in completion order. Fails without
    /// running anything further when the remaining tasks cannot become ready,
    /// or when the oracle becomes unreachable.
    pub async fn execute(&self, tasks: Vec<Subtask>) -> Result<OutcomeSet, OrchestratorError> {
        ensure_unique_ids(&tasks)?;

        let mut pending: IndexMap<String, Subtask> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut completed = OutcomeSet::with_capacity(pending.len());
        let mut wave_number = 0usize;

        while !pending.is_empty() {
            let ready: Vec<String> = pending
                .values()
                .filter(|t| t.dependencies.iter().all(|d| completed.contains_key(d)))
                .map(|t| t.id.clone())
                .collect();

            if ready.is_empty() {
                let err = blocked(&pending, &completed);
                tracing::error!("{}", err);
                return Err(err.into());
            }

            wave_number += 1;
            tracing::info!(
                wave = wave_number,
                ready = ready.len(),
                remaining = pending.len(),
                "Dispatching wave: {}",
                ready.join(", ")
            );

            let wave: Vec<Subtask> = ready
                .iter()
                .filter_map(|id| pending.shift_remove(id))
                .collect();

            for outcome in self.run_wave(&wave).await? {
                completed.insert(outcome.task_id.clone(), outcome);
            }
        }

        let failed = completed.values().filter(|o| !o.is_completed()).count();
        tracing::info!(
            waves = wave_number,
            tasks = completed.len(),
            failed,
            "All subtasks resolved"
        );
        Ok(completed)
    }

    async fn run_wave(&self, wave: &[Subtask]) -> Result<Vec<TaskOutcome>, OracleError> {
        match self.mode {
            DispatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(wave.len());
                for task in wave {
                    outcomes.push(self.worker.run(task).await?);
                }
                Ok(outcomes)
            }
            DispatchMode::Concurrent { max_workers } => {
                // `buffered` yields in submission order, so outcomes line up with the wave.
                stream::iter(wave.iter().map(|task| self.worker.run(task)))
                    .buffered(max_workers.max(1))
                    .try_collect()
                    .await
            }
        }
    }
}

fn blocked(pending: &IndexMap<String, Subtask>, completed: &OutcomeSet) -> CircularDependencyError {
    let mut unknown: Vec<String> = Vec::new();
    for dep in pending.values().flat_map(|t| t.dependencies.iter()) {
        if !pending.contains_key(dep) && !completed.contains_key(dep) && !unknown.contains(dep) {
            unknown.push(dep.clone());
        }
    }

    CircularDependencyError {
        blocked: pending.keys().cloned().collect(),
        unknown,
    }
}
