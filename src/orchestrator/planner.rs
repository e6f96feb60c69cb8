//! Planning phase: decompose a task description into subtasks.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use super::error::{OrchestratorError, PlanningError};
use crate::extraction::extract_as;
use crate::oracle::SharedOracle;
use crate::task::Subtask;

/// Subtasks plus the model's explanation of the breakdown.
#[derive(Debug, Clone)]
pub struct Plan {
    pub tasks: Vec<Subtask>,
    pub rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanReply {
    subtasks: Vec<Subtask>,
    #[serde(default)]
    reasoning: Option<Value>,
}

pub struct Planner {
    oracle: SharedOracle,
}

impl Planner {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub fn prompt(task: &str) -> String {
        format!(
            r#"As an orchestrator, break down the following task into subtasks.
Respond in JSON format with the following structure:
{{
    "subtasks": [
        {{
            "id": "unique_id",
            "task_type": "code|research|analysis|synthesis",
            "description": "detailed description",
            "context": {{"key": "value"}},
            "dependencies": ["dependency_task_ids"],
            "priority": 0-10
        }}
    ],
    "reasoning": "explanation of the breakdown"
}}

Task: {task}

Consider:
1. Dependencies between subtasks
2. Required context for each subtask
3. Priority of execution
"#
        )
    }

    /// Ask the oracle for a plan. One oracle call.
    pub async fn plan(&self, task: &str) -> Result<Plan, OrchestratorError> {
        let response = self.oracle.generate(&Self::prompt(task)).await?;
        tracing::debug!(response = %response, "Planning response");

        let plan = Self::parse(&response)?;
        tracing::info!(
            subtasks = plan.tasks.len(),
            "Planned {}",
            plan.tasks
                .iter()
                .map(|t| t.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(plan)
    }

    /// Parse a planning reply without calling the oracle.
    pub fn parse(response: &str) -> Result<Plan, PlanningError> {
        let reply: PlanReply = extract_as(response)?;
        ensure_unique_ids(&reply.subtasks)?;

        let rationale = match reply.reasoning {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };

        Ok(Plan {
            tasks: reply.subtasks,
            rationale,
        })
    }
}

pub(crate) fn ensure_unique_ids(tasks: &[Subtask]) -> Result<(), PlanningError> {
    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(PlanningError::DuplicateTaskId(task.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionError;
    use crate::oracle::testing::ScriptedOracle;
    use crate::task::TaskCategory;
    use std::sync::Arc;

    const PLAN: &str = r#"Here's my breakdown:
{
    "subtasks": [
        {"id": "research", "task_type": "research", "description": "Survey validation rules", "context": {}, "dependencies": [], "priority": 9},
        {"id": "backend", "task_type": "code", "description": "API validation", "context": {"lang": "rust"}, "dependencies": ["research"], "priority": 7}
    ],
    "reasoning": "Research first, then code."
}
Hope this helps!"#;

    #[test]
    fn test_prompt_embeds_task_and_schema() {
        let prompt = Planner::prompt("Add input validation");
        assert!(prompt.contains("Task: Add input validation"));
        assert!(prompt.contains(r#""task_type": "code|research|analysis|synthesis""#));
        assert!(prompt.contains(r#""reasoning""#));
    }

    #[test]
    fn test_parse_plan() {
        let plan = Planner::parse(PLAN).unwrap();

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].category, TaskCategory::Code);
        assert_eq!(plan.tasks[1].dependencies, vec!["research".to_string()]);
        assert_eq!(plan.rationale.as_deref(), Some("Research first, then code."));
    }

    #[test]
    fn test_missing_subtasks_is_planning_error() {
        let err = Planner::parse(r#"{"reasoning": "nothing to do"}"#).unwrap_err();
        assert!(matches!(
            err,
            PlanningError::Unparsable(ExtractionError::Schema(_))
        ));
        assert!(err.to_string().contains("subtasks"));
    }

    #[test]
    fn test_garbage_and_bad_records() {
        assert!(matches!(
            Planner::parse("I'd rather not."),
            Err(PlanningError::Unparsable(ExtractionError::NoObject))
        ));

        let unknown_type = r#"{"subtasks": [{"id": "a", "task_type": "design", "description": "d"}]}"#;
        assert!(Planner::parse(unknown_type).is_err());
    }

    #[test]
    fn test_loose_priority_values_do_not_fail_plan() {
        let plan = Planner::parse(
            r#"{"subtasks": [
                {"id": "a", "task_type": "code", "description": "d", "priority": 7.5},
                {"id": "b", "task_type": "code", "description": "d", "priority": "high"},
                {"id": "c", "task_type": "code", "description": "d", "priority": null},
                {"id": "d", "task_type": "code", "description": "d", "priority": 4}
            ]}"#,
        )
        .unwrap();

        let priorities: Vec<i64> = plan.tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![8, 0, 0, 4]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let plan = r#"{"subtasks": [
            {"id": "a", "task_type": "code", "description": "one"},
            {"id": "a", "task_type": "code", "description": "two"}
        ]}"#;
        assert!(matches!(
            Planner::parse(plan),
            Err(PlanningError::DuplicateTaskId(id)) if id == "a"
        ));
    }

    #[test]
    fn test_structured_reasoning_is_stringified() {
        let plan = Planner::parse(r#"{"subtasks": [], "reasoning": ["step 1", "step 2"]}"#).unwrap();
        assert_eq!(plan.rationale.as_deref(), Some(r#"["step 1","step 2"]"#));
        assert!(plan.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_plan_calls_oracle_once() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise(PLAN));
        let planner = Planner::new(oracle.clone());

        let plan = planner.plan("validate the form").await.unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(oracle.calls(), 1);
        assert!(oracle.prompts()[0].contains("validate the form"));
    }
}
