//! Execution of a single subtask.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::extraction::extract_as;
use crate::oracle::{OracleError, SharedOracle};
use crate::task::{Subtask, TaskOutcome};

#[derive(Debug, Deserialize)]
struct WorkerReply {
    result: Value,
    #[serde(default)]
    metadata: Option<Value>,
}

impl WorkerReply {
    fn into_outcome(self, task_id: &str) -> TaskOutcome {
        let metadata = match self.metadata {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("details".to_string(), other);
                map
            }
        };
        TaskOutcome::completed(task_id, self.result, metadata)
    }
}

pub struct Worker {
    oracle: SharedOracle,
}

impl Worker {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub fn prompt(task: &Subtask) -> String {
        let context = serde_json::to_string_pretty(&task.context).unwrap_or_else(|_| "{}".into());
        let mut prompt = format!(
            r#"Complete the following subtask:
Description: {}

Context:
{}

Provide your response in JSON format with:
{{
    "result": "your detailed result",
    "confidence": 0.0 to 1.0,
    "metadata": {{"key": "value"}}
}}
"#,
            task.description, context
        );

        if let Some(suffix) = task.category.prompt_suffix() {
            prompt.push('\n');
            prompt.push_str(suffix);
        }
        prompt
    }

    /// Run one subtask.
    ///
    /// A reply that cannot be parsed yields a failed outcome. Only an
    /// unreachable oracle is returned as an error.
    pub async fn run(&self, task: &Subtask) -> Result<TaskOutcome, OracleError> {
        tracing::debug!(task_id = %task.id, category = %task.category, "Running subtask");

        let response = self.oracle.generate(&Self::prompt(task)).await?;

        let outcome = match extract_as::<WorkerReply>(&response) {
            Ok(reply) => reply.into_outcome(&task.id),
            Err(e) => {
                tracing::warn!(task_id = %task.id, "Subtask reply unusable: {}", e);
                TaskOutcome::failed(&task.id, e)
            }
        };

        tracing::info!(task_id = %task.id, status = %outcome.status, "Subtask finished");
        Ok(outcome)
    }
}
