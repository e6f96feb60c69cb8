//! Errors that abort an orchestration run.
//!
//! Per-task failures are not errors: the worker records them as failed
//! outcomes and the run carries on.

use std::fmt;

use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::oracle::OracleError;

/// The planning reply could not be turned into a valid task set.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("failed to parse task planning response: {0}")]
    Unparsable(#[from] ExtractionError),

    #[error("duplicate task id {0:?} in plan")]
    DuplicateTaskId(String),
}

/// No pending task has all of its dependencies satisfied.
///
/// Raised for genuine cycles and for dependencies on ids that are not part
/// of the task set; the two are indistinguishable to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularDependencyError {
    /// Pending task ids, in task-set order
    pub blocked: Vec<String>,
    /// Dependency ids that name no task at all
    pub unknown: Vec<String>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "circular dependency detected in tasks: {}",
            self.blocked.join(", ")
        )?;
        if !self.unknown.is_empty() {
            write!(f, " (unknown dependencies: {})", self.unknown.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for CircularDependencyError {}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}
