//! Evaluator-optimizer: generate, score against weighted criteria, and
//! regenerate with the evaluator's feedback until a target score is reached.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::extraction::extract_as;
use crate::oracle::{OracleError, SharedOracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationType {
    Translation,
    Search,
    Writing,
    Code,
    Custom,
}

impl EvaluationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationType::Translation => "translation",
            EvaluationType::Search => "search",
            EvaluationType::Writing => "writing",
            EvaluationType::Code => "code",
            EvaluationType::Custom => "custom",
        }
    }
}

impl fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationCriteria {
    pub name: String,
    pub description: String,
    pub weight: f64,
    pub min_score: f64,
    pub max_score: f64,
}

impl EvaluationCriteria {
    pub fn new(name: impl Into<String>, description: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight,
            min_score: 0.0,
            max_score: 1.0,
        }
    }
}

/// One evaluator verdict, as parsed from the model's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub scores: IndexMap<String, f64>,
    pub feedback: IndexMap<String, String>,
    pub overall_score: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub iteration: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Iteration {
    pub iteration: usize,
    pub result: String,
    pub evaluation: EvaluationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriterionImprovement {
    pub initial_score: f64,
    pub final_score: f64,
    pub improvement: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImprovementSummary {
    pub criteria_improvements: IndexMap<String, CriterionImprovement>,
    pub overall_improvement: f64,
    pub iterations_required: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Latest generated result; may be newer than the last evaluation
    pub final_result: Option<String>,
    pub iterations: Vec<Iteration>,
    pub final_score: f64,
    pub improvement_summary: Option<ImprovementSummary>,
}

pub struct EvaluatorOptimizer {
    oracle: SharedOracle,
    eval_type: EvaluationType,
    criteria: Vec<EvaluationCriteria>,
    max_iterations: usize,
    target_score: f64,
}

impl EvaluatorOptimizer {
    /// Defaults to 3 iterations and a target score of 0.9.
    pub fn new(oracle: SharedOracle, eval_type: EvaluationType, criteria: Vec<EvaluationCriteria>) -> Self {
        Self {
            oracle,
            eval_type,
            criteria,
            max_iterations: 3,
            target_score: 0.9,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_target_score(mut self, target_score: f64) -> Self {
        self.target_score = target_score;
        self
    }

    fn format_criteria(&self) -> String {
        self.criteria
            .iter()
            .map(|c| format!("- {} (weight: {}): {}", c.name, c.weight, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn optimizer_prompt(&self, task: &str, previous: Option<(&str, &EvaluationResult)>) -> String {
        let mut prompt = format!(
            "Task: {}\n\nEvaluation Type: {}\n\nCriteria to consider:\n{}",
            task,
            self.eval_type,
            self.format_criteria()
        );

        if let Some((result, evaluation)) = previous {
            let feedback = serde_json::to_string_pretty(evaluation).unwrap_or_default();
            prompt.push_str(&format!(
                r#"

Previous Result:
{result}

Feedback Received:
{feedback}

Please improve the result based on the feedback while maintaining the original intent.
Focus especially on areas with lower scores.
"#
            ));
        }
        prompt
    }

    fn evaluator_prompt(&self, task: &str, result: &str) -> String {
        format!(
            r#"Evaluate the following result based on specified criteria.

Task: {task}
Evaluation Type: {eval_type}

Result to evaluate:
{result}

Criteria:
{criteria}

Provide evaluation in JSON format:
{{
    "scores": {{
        "criteria_name": score (0.0 to 1.0)
    }},
    "feedback": {{
        "criteria_name": "detailed feedback"
    }},
    "overall_score": 0.0 to 1.0,
    "suggestions": [
        "specific improvement suggestions"
    ]
}}

Ensure feedback is specific and actionable."#,
            eval_type = self.eval_type,
            criteria = self.format_criteria()
        )
    }

    /// Weighted mean of `scores` over the configured criteria.
    ///
    /// Criteria missing from `scores` count as zero. Returns 0.0 when the
    /// criteria carry no weight.
    pub fn overall_score(&self, scores: &IndexMap<String, f64>) -> f64 {
        let total_weight: f64 = self.criteria.iter().map(|c| c.weight).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .criteria
            .iter()
            .filter_map(|c| scores.get(&c.name).map(|s| s * c.weight))
            .sum();
        weighted / total_weight
    }

    /// Run the loop. `initial_result` skips the first generation.
    ///
    /// An evaluation reply that cannot be parsed ends the loop with the
    /// history gathered so far.
    pub async fn optimize(
        &self,
        task: &str,
        initial_result: Option<String>,
    ) -> Result<OptimizationResult, OracleError> {
        let mut current = initial_result.filter(|r| !r.is_empty());
        let mut history: Vec<Iteration> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let result = match current.take() {
                Some(result) => result,
                None => self.oracle.generate(&self.optimizer_prompt(task, None)).await?,
            };

            let response = self.oracle.generate(&self.evaluator_prompt(task, &result)).await?;
            let mut evaluation = match extract_as::<EvaluationResult>(&response) {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    tracing::warn!(iteration, "Error in evaluation: {}", e);
                    current = Some(result);
                    break;
                }
            };
            evaluation.iteration = iteration;
            tracing::info!(iteration, score = evaluation.overall_score, "Result evaluated");

            let reached = evaluation.overall_score >= self.target_score;
            history.push(Iteration {
                iteration,
                result: result.clone(),
                evaluation,
            });

            if reached {
                current = Some(result);
                break;
            }

            let last = &history[history.len() - 1].evaluation;
            let improved = self
                .oracle
                .generate(&self.optimizer_prompt(task, Some((&result, last))))
                .await?;
            current = Some(improved);
        }

        let final_score = history.last().map_or(0.0, |h| h.evaluation.overall_score);
        let improvement_summary = self.improvement_summary(&history);

        Ok(OptimizationResult {
            final_result: current,
            iterations: history,
            final_score,
            improvement_summary,
        })
    }

    fn improvement_summary(&self, history: &[Iteration]) -> Option<ImprovementSummary> {
        let first = &history.first()?.evaluation;
        let last = &history.last()?.evaluation;

        let criteria_improvements = self
            .criteria
            .iter()
            .filter_map(|c| {
                let initial = *first.scores.get(&c.name)?;
                let latest = *last.scores.get(&c.name)?;
                Some((
                    c.name.clone(),
                    CriterionImprovement {
                        initial_score: initial,
                        final_score: latest,
                        improvement: latest - initial,
                    },
                ))
            })
            .collect();

        Some(ImprovementSummary {
            criteria_improvements,
            overall_improvement: last.overall_score - first.overall_score,
            iterations_required: history.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::ScriptedOracle;
    use std::sync::Arc;

    fn criteria() -> Vec<EvaluationCriteria> {
        vec![
            EvaluationCriteria::new("accuracy", "Accuracy of meaning", 1.0),
            EvaluationCriteria::new("fluency", "Natural flow", 0.5),
        ]
    }

    fn evaluation(accuracy: f64, fluency: f64, overall: f64) -> String {
        format!(
            r#"{{"scores": {{"accuracy": {accuracy}, "fluency": {fluency}}},
                "feedback": {{"accuracy": "ok", "fluency": "stiff"}},
                "overall_score": {overall},
                "suggestions": ["smoother wording"]}}"#
        )
    }

    #[test]
    fn test_overall_score_is_weighted() {
        let optimizer = EvaluatorOptimizer::new(
            Arc::new(ScriptedOracle::new()),
            EvaluationType::Translation,
            criteria(),
        );
        let mut scores = IndexMap::new();
        scores.insert("accuracy".to_string(), 0.9);
        scores.insert("fluency".to_string(), 0.6);
        assert!((optimizer.overall_score(&scores) - 0.8).abs() < 1e-9);

        scores.shift_remove("fluency");
        assert!((optimizer.overall_score(&scores) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_prompts() {
        let optimizer = EvaluatorOptimizer::new(
            Arc::new(ScriptedOracle::new()),
            EvaluationType::Writing,
            criteria(),
        );
        let prompt = optimizer.optimizer_prompt("Write a post", None);
        assert!(prompt.starts_with("Task: Write a post\n\nEvaluation Type: writing"));
        assert!(prompt.contains("- accuracy (weight: 1): Accuracy of meaning"));
        assert!(!prompt.contains("Previous Result"));

        let prompt = optimizer.evaluator_prompt("Write a post", "Draft text");
        assert!(prompt.contains("Result to evaluate:\nDraft text"));
    }

    #[tokio::test]
    async fn test_stops_at_target_score() {
        let (weak, strong) = (evaluation(0.6, 0.5, 0.6), evaluation(0.95, 0.9, 0.93));
        let oracle = Arc::new(ScriptedOracle::new().queue(&[
            "Draft one",
            weak.as_str(),
            "Draft two",
            strong.as_str(),
        ]));
        let optimizer = EvaluatorOptimizer::new(oracle.clone(), EvaluationType::Translation, criteria());

        let result = optimizer.optimize("Translate", None).await.unwrap();

        assert_eq!(result.final_result.as_deref(), Some("Draft two"));
        assert_eq!(result.iterations.len(), 2);
        assert_eq!(result.iterations[1].evaluation.iteration, 2);
        assert_eq!(result.final_score, 0.93);
        assert_eq!(oracle.calls(), 4);

        let regenerate = &oracle.prompts()[2];
        assert!(regenerate.contains("Previous Result:\nDraft one"));
        assert!(regenerate.contains(r#""fluency": "stiff""#));

        let summary = result.improvement_summary.unwrap();
        assert_eq!(summary.iterations_required, 2);
        assert!((summary.overall_improvement - 0.33).abs() < 1e-9);
        let accuracy = &summary.criteria_improvements["accuracy"];
        assert_eq!(accuracy.initial_score, 0.6);
        assert_eq!(accuracy.final_score, 0.95);
    }

    #[tokio::test]
    async fn test_initial_result_skips_first_generation() {
        let perfect = evaluation(1.0, 1.0, 1.0);
        let oracle = Arc::new(ScriptedOracle::new().queue(&[perfect.as_str()]));
        let result = EvaluatorOptimizer::new(oracle.clone(), EvaluationType::Code, criteria())
            .optimize("Fix the bug", Some("patch".into()))
            .await
            .unwrap();

        assert_eq!(result.final_result.as_deref(), Some("patch"));
        assert_eq!(oracle.calls(), 1);
        assert!(oracle.prompts()[0].starts_with("Evaluate the following result"));
    }

    #[tokio::test]
    async fn test_unparsable_evaluation_stops_loop() {
        let oracle = Arc::new(ScriptedOracle::new().queue(&["Draft", "I think it's fine"]));
        let result = EvaluatorOptimizer::new(oracle.clone(), EvaluationType::Custom, criteria())
            .optimize("Anything", None)
            .await
            .unwrap();

        assert_eq!(result.final_result.as_deref(), Some("Draft"));
        assert!(result.iterations.is_empty());
        assert_eq!(result.final_score, 0.0);
        assert!(result.improvement_summary.is_none());
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_max_iterations_leaves_latest_draft() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .when("Evaluate the following result", &evaluation(0.5, 0.5, 0.5))
                .otherwise("Draft"),
        );
        let result = EvaluatorOptimizer::new(oracle.clone(), EvaluationType::Search, criteria())
            .with_max_iterations(2)
            .with_target_score(0.99)
            .optimize("Find sources", None)
            .await
            .unwrap();

        // generate, evaluate, regenerate, evaluate, regenerate
        assert_eq!(oracle.calls(), 5);
        assert_eq!(result.iterations.len(), 2);
        assert_eq!(result.final_score, 0.5);
        assert_eq!(result.improvement_summary.unwrap().overall_improvement, 0.0);
    }
}
