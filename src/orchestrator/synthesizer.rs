//! Final phase: merge every subtask outcome into one answer.

use crate::oracle::{OracleError, SharedOracle};
use crate::task::OutcomeSet;

pub struct Synthesizer {
    oracle: SharedOracle,
}

impl Synthesizer {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub fn prompt(outcomes: &OutcomeSet) -> String {
        let results = serde_json::to_string_pretty(outcomes)
            .unwrap_or_else(|e| format!("<results could not be serialized: {}>", e));

        format!(
            r#"Synthesize the following subtask results into a coherent final response:

Results:
{results}

Provide a comprehensive response that:
1. Integrates all subtask results
2. Resolves any conflicts
3. Presents a clear final solution
4. Includes relevant details from subtasks
5. Notes any subtask with status "failed" and how its absence affects the answer
"#
        )
    }

    /// One oracle call; the reply is returned as-is.
    pub async fn synthesize(&self, outcomes: &OutcomeSet) -> Result<String, OracleError> {
        let prompt = Self::prompt(outcomes);
        tracing::debug!(outcomes = outcomes.len(), "Synthesizing results");
        self.oracle.generate(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::ScriptedOracle;
    use crate::task::TaskOutcome;
    use serde_json::{json, Map};
    use std::sync::Arc;

    fn outcomes() -> OutcomeSet {
        let mut set = OutcomeSet::new();
        set.insert(
            "a".into(),
            TaskOutcome::completed("a", json!("schema drafted"), Map::new()),
        );
        set.insert("b".into(), TaskOutcome::failed("b", "no JSON object found in response"));
        set
    }

    #[test]
    fn test_prompt_serializes_every_outcome_in_order() {
        let prompt = Synthesizer::prompt(&outcomes());

        let a = prompt.find(r#""task_id": "a""#).unwrap();
        let b = prompt.find(r#""task_id": "b""#).unwrap();
        assert!(a < b);
        assert!(prompt.contains(r#""result": "schema drafted""#));
        assert!(prompt.contains(r#""status": "failed""#));
        assert!(prompt.contains(r#""error": "no JSON object found in response""#));
    }

    #[tokio::test]
    async fn test_returns_raw_text() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise("Final answer, not JSON."));
        let text = Synthesizer::new(oracle.clone())
            .synthesize(&outcomes())
            .await
            .unwrap();

        assert_eq!(text, "Final answer, not JSON.");
        assert_eq!(oracle.calls(), 1);
    }
}
