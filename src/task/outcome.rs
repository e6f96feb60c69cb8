use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal state of a subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The one result recorded for a subtask.
///
/// A failed outcome carries the error text both as its payload and under
/// `metadata.error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub status: OutcomeStatus,
    #[serde(rename = "result")]
    pub payload: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TaskOutcome {
    pub fn completed(task_id: impl Into<String>, payload: Value, metadata: Map<String, Value>) -> Self {
        Self {
            task_id: task_id.into(),
            status: OutcomeStatus::Completed,
            payload,
            metadata,
        }
    }

    pub fn failed(task_id: impl Into<String>, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(message.clone()));
        Self {
            task_id: task_id.into(),
            status: OutcomeStatus::Failed,
            payload: Value::String(message),
            metadata,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    /// Error text of a failed outcome.
    pub fn error(&self) -> Option<&str> {
        match self.status {
            OutcomeStatus::Failed => self.metadata.get("error").and_then(Value::as_str),
            OutcomeStatus::Completed => None,
        }
    }
}

/// Outcomes keyed by task id, in the order they were recorded.
pub type OutcomeSet = IndexMap<String, TaskOutcome>;
