//! Task module - the unit of decomposed work and its terminal outcome.
//!
//! - `Subtask`: one planned unit of work with declared dependencies
//! - `TaskOutcome`: the single result recorded for a subtask, success or failure
//!
//! Both are plain data. Scheduling lives in `orchestrator`.

mod outcome;
mod subtask;

pub use outcome::{OutcomeSet, OutcomeStatus, TaskOutcome};
pub use subtask::{Subtask, TaskCategory, UnknownCategory};
