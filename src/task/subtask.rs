use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Kind of work a subtask represents. Selects the worker prompt suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Code,
    Research,
    Analysis,
    Synthesis,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 4] = [Self::Code, Self::Research, Self::Analysis, Self::Synthesis];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Synthesis => "synthesis",
        }
    }

    /// Extra worker instructions for this kind of task.
    pub fn prompt_suffix(self) -> Option<&'static str> {
        match self {
            Self::Code => {
                Some("Provide code changes as git-style patches or complete file contents.")
            }
            Self::Research => Some("Provide sources, key findings, and confidence levels."),
            Self::Analysis => Some("Provide detailed analysis with supporting evidence."),
            Self::Synthesis => None,
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task type {0:?} (expected code, research, analysis or synthesis)")]
pub struct UnknownCategory(pub String);

impl FromStr for TaskCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

// Models capitalize freely; accept any casing.
impl<'de> Deserialize<'de> for TaskCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A unit of work produced by the planner.
///
/// Field names on the wire follow the plan schema the planner shows the
/// model; `dependencies`, `context` and `priority` may be omitted or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Unique within one run
    pub id: String,
    #[serde(rename = "task_type")]
    pub category: TaskCategory,
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: Map<String, Value>,
    /// Ids of subtasks whose outcome must exist before this one runs
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    /// Carried through for the model's benefit; not used for ordering
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: i64,
}

impl Subtask {
    pub fn new(id: impl Into<String>, category: TaskCategory, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            description: description.into(),
            context: Map::new(),
            dependencies: Vec::new(),
            priority: 0,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Priority never affects scheduling, so a float is rounded and anything
// non-numeric reads as 0 rather than failing the whole plan.
fn lenient_priority<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let priority = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or_default(),
        _ => 0,
    };
    Ok(priority)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_suffix_per_category() {
        assert!(TaskCategory::Code.prompt_suffix().unwrap().contains("git-style patches"));
        assert!(TaskCategory::Research.prompt_suffix().unwrap().contains("sources"));
        assert!(TaskCategory::Analysis.prompt_suffix().unwrap().contains("evidence"));
        assert_eq!(TaskCategory::Synthesis.prompt_suffix(), None);
    }

    #[test]
    fn test_category_parsing_is_case_insensitive() {
        assert_eq!("Research".parse::<TaskCategory>(), Ok(TaskCategory::Research));
        assert_eq!(" CODE ".parse::<TaskCategory>(), Ok(TaskCategory::Code));
        assert!("design".parse::<TaskCategory>().is_err());
    }

    #[test]
    fn test_deserialize_plan_record() {
        let task: Subtask = serde_json::from_value(json!({
            "id": "frontend",
            "task_type": "code",
            "description": "Validate the form",
            "context": {"framework": "react"},
            "dependencies": ["design"],
            "priority": 8
        }))
        .unwrap();

        assert_eq!(task.category, TaskCategory::Code);
        assert_eq!(task.context["framework"], "react");
        assert_eq!(task.dependencies, vec!["design".to_string()]);
        assert_eq!(task.priority, 8);
    }

    #[test]
    fn test_optional_fields_tolerate_null_and_absence() {
        let task: Subtask = serde_json::from_value(json!({
            "id": "a",
            "task_type": "analysis",
            "description": "d",
            "dependencies": null,
            "context": null
        }))
        .unwrap();

        assert!(task.dependencies.is_empty());
        assert!(task.context.is_empty());
        assert_eq!(task.priority, 0);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result: Result<Subtask, _> =
            serde_json::from_value(json!({"id": "a", "description": "no type"}));
        assert!(result.unwrap_err().to_string().contains("task_type"));
    }

    #[test]
    fn test_serializes_with_plan_field_names() {
        let task = Subtask::new("b", TaskCategory::Research, "look it up")
            .depends_on(["a"])
            .with_priority(3);
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["task_type"], "research");
        assert_eq!(json["dependencies"], json!(["a"]));
    }
}
