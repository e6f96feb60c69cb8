//! Prompt chaining: each step's response becomes context for the next.

use futures::future::try_join_all;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::oracle::{OracleError, SharedOracle};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("branch '{0}' not found in available branches")]
    UnknownBranch(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelChainResult {
    pub base_response: String,
    /// Follow-up prompt -> response, in the order the prompts were given
    pub follow_ups: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainPath {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConditionalResult {
    pub initial_response: String,
    pub final_response: String,
    pub path_taken: ChainPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchResult {
    pub initial_response: String,
    pub selected_branch: String,
    pub branch_responses: Vec<String>,
}

pub struct PromptChainer {
    oracle: SharedOracle,
}

impl PromptChainer {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    /// Run `prompts` in order, threading each response into the next prompt.
    ///
    /// `context` seeds the first step; an empty context sends the first
    /// prompt unchanged.
    pub async fn sequential_chain<S: AsRef<str>>(
        &self,
        prompts: &[S],
        context: &str,
    ) -> Result<Vec<String>, OracleError> {
        self.run_steps(prompts, context.to_string()).await
    }

    /// One base call, then every follow-up against the base response.
    ///
    /// Follow-ups are independent of each other and run concurrently.
    pub async fn parallel_chain<S: AsRef<str>>(
        &self,
        base_prompt: &str,
        follow_ups: &[S],
    ) -> Result<ParallelChainResult, OracleError> {
        let base_response = self.oracle.generate(base_prompt).await?;

        let prompts: Vec<String> = follow_ups
            .iter()
            .map(|p| format!("Based on this information:\n{}\n\nTask: {}", base_response, p.as_ref()))
            .collect();
        let responses = try_join_all(prompts.iter().map(|p| self.oracle.generate(p))).await?;

        let follow_ups = follow_ups
            .iter()
            .map(|p| p.as_ref().to_string())
            .zip(responses)
            .collect();

        Ok(ParallelChainResult {
            base_response,
            follow_ups,
        })
    }

    /// Pick the success or failure prompt based on `condition` applied to
    /// the first response. The condition is evaluated once.
    pub async fn conditional_chain(
        &self,
        initial_prompt: &str,
        condition: impl FnOnce(&str) -> bool,
        success_prompt: &str,
        failure_prompt: &str,
    ) -> Result<ConditionalResult, OracleError> {
        let initial_response = self.oracle.generate(initial_prompt).await?;

        let (path_taken, next_prompt) = if condition(&initial_response) {
            (ChainPath::Success, success_prompt)
        } else {
            (ChainPath::Failure, failure_prompt)
        };
        tracing::debug!(path = ?path_taken, "Conditional chain branch selected");

        let prompt = format!(
            "Based on the previous response: {}\n\nTask: {}",
            initial_response, next_prompt
        );
        let final_response = self.oracle.generate(&prompt).await?;

        Ok(ConditionalResult {
            initial_response,
            final_response,
            path_taken,
        })
    }

    /// Refine a response up to `max_iterations` responses in total.
    ///
    /// `stop` receives `(previous, new)` after each refinement; returning
    /// true keeps the new response and ends the loop.
    pub async fn iterative_refinement_chain(
        &self,
        initial_prompt: &str,
        refinement_prompt: &str,
        max_iterations: usize,
        stop: Option<&(dyn Fn(&str, &str) -> bool + Send + Sync)>,
    ) -> Result<Vec<String>, OracleError> {
        let mut current = self.oracle.generate(initial_prompt).await?;
        let mut responses = vec![current.clone()];

        for round in 1..max_iterations {
            let prompt = format!("Previous response: {}\n\nTask: {}", current, refinement_prompt);
            let refined = self.oracle.generate(&prompt).await?;
            responses.push(refined.clone());

            if stop.is_some_and(|f| f(&current, &refined)) {
                tracing::debug!(round, "Refinement stopped early");
                break;
            }
            current = refined;
        }

        Ok(responses)
    }

    /// Choose a named branch from the first response and run it as a
    /// sequential chain seeded with that response.
    pub async fn branching_chain(
        &self,
        initial_prompt: &str,
        branches: &IndexMap<String, Vec<String>>,
        selector: impl FnOnce(&str) -> String,
    ) -> Result<BranchResult, ChainError> {
        let initial_response = self.oracle.generate(initial_prompt).await?;
        let selected_branch = selector(&initial_response);

        let prompts = branches
            .get(&selected_branch)
            .ok_or_else(|| ChainError::UnknownBranch(selected_branch.clone()))?;
        tracing::debug!(branch = %selected_branch, steps = prompts.len(), "Running branch");

        let branch_responses = self.run_steps(prompts, initial_response.clone()).await?;

        Ok(BranchResult {
            initial_response,
            selected_branch,
            branch_responses,
        })
    }

    async fn run_steps<S: AsRef<str>>(
        &self,
        prompts: &[S],
        mut context: String,
    ) -> Result<Vec<String>, OracleError> {
        let mut responses = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let prompt = prompt.as_ref();
            let full_prompt = if context.is_empty() {
                prompt.to_string()
            } else {
                format!("Context: {}\n\nTask: {}", context, prompt)
            };
            let response = self.oracle.generate(&full_prompt).await?;
            context = response.clone();
            responses.push(response);
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::ScriptedOracle;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequential_chain_threads_context() {
        let oracle = Arc::new(ScriptedOracle::new().queue(&["story", "poem", "script"]));
        let chainer = PromptChainer::new(oracle.clone());

        let responses = chainer
            .sequential_chain(&["Write a story", "Make it a poem", "Outline a script"], "")
            .await
            .unwrap();

        assert_eq!(responses, vec!["story", "poem", "script"]);
        let prompts = oracle.prompts();
        assert_eq!(prompts[0], "Write a story");
        assert_eq!(prompts[1], "Context: story\n\nTask: Make it a poem");
        assert_eq!(prompts[2], "Context: poem\n\nTask: Outline a script");
    }

    #[tokio::test]
    async fn test_sequential_chain_with_seed_context() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise("ok"));
        PromptChainer::new(oracle.clone())
            .sequential_chain(&["Summarize"], "robots")
            .await
            .unwrap();
        assert_eq!(oracle.prompts()[0], "Context: robots\n\nTask: Summarize");
    }

    #[tokio::test]
    async fn test_parallel_chain_keeps_follow_up_order() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .when("healthcare", "hospitals")
                .when("ethical", "bias")
                .otherwise("ML is pattern learning"),
        );
        let result = PromptChainer::new(oracle.clone())
            .parallel_chain("Explain ML", &["ethical concerns?", "healthcare uses?"])
            .await
            .unwrap();

        assert_eq!(result.base_response, "ML is pattern learning");
        let pairs: Vec<_> = result.follow_ups.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("ethical concerns?", "bias"), ("healthcare uses?", "hospitals")]);
        assert!(oracle.prompts()[1].starts_with("Based on this information:\nML is pattern learning"));
    }

    #[tokio::test]
    async fn test_conditional_chain_paths() {
        let oracle = Arc::new(ScriptedOracle::new().queue(&["a great future", "more detail"]));
        let result = PromptChainer::new(oracle.clone())
            .conditional_chain("Future of AI?", |r| r.contains("great"), "Elaborate", "Propose fixes")
            .await
            .unwrap();
        assert_eq!(result.path_taken, ChainPath::Success);
        assert_eq!(result.final_response, "more detail");
        assert!(oracle.prompts()[1].ends_with("Task: Elaborate"));

        let oracle = Arc::new(ScriptedOracle::new().queue(&["grim", "fixes"]));
        let result = PromptChainer::new(oracle.clone())
            .conditional_chain("Future of AI?", |r| r.contains("great"), "Elaborate", "Propose fixes")
            .await
            .unwrap();
        assert_eq!(result.path_taken, ChainPath::Failure);
        assert!(oracle.prompts()[1].ends_with("Task: Propose fixes"));
    }

    #[tokio::test]
    async fn test_refinement_stops_on_condition() {
        let oracle = Arc::new(ScriptedOracle::new().queue(&["short", "a bit longer", "a bit longer!"]));
        let no_growth = |prev: &str, new: &str| new.len() as f64 <= prev.len() as f64 * 1.1;

        let responses = PromptChainer::new(oracle.clone())
            .iterative_refinement_chain("Explain", "More detail", 5, Some(&no_growth))
            .await
            .unwrap();

        assert_eq!(responses, vec!["short", "a bit longer", "a bit longer!"]);
        assert_eq!(oracle.calls(), 3);
        assert_eq!(oracle.prompts()[2], "Previous response: a bit longer\n\nTask: More detail");
    }

    #[tokio::test]
    async fn test_refinement_respects_max_iterations() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise("same"));
        let responses = PromptChainer::new(oracle.clone())
            .iterative_refinement_chain("Explain", "More", 3, None)
            .await
            .unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn test_branching_chain() {
        let mut branches = IndexMap::new();
        branches.insert("technical".to_string(), vec!["Architecture".to_string(), "Code".to_string()]);
        branches.insert("general".to_string(), vec!["Analogy".to_string()]);

        let oracle = Arc::new(ScriptedOracle::new().queue(&["very technical topic", "layers", "snippet"]));
        let result = PromptChainer::new(oracle.clone())
            .branching_chain("Explain NNs", &branches, |r| {
                let branch = if r.contains("technical") { "technical" } else { "general" };
                branch.to_string()
            })
            .await
            .unwrap();

        assert_eq!(result.selected_branch, "technical");
        assert_eq!(result.branch_responses, vec!["layers", "snippet"]);
        assert_eq!(oracle.prompts()[1], "Context: very technical topic\n\nTask: Architecture");
    }

    #[tokio::test]
    async fn test_unknown_branch() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise("anything"));
        let err = PromptChainer::new(oracle.clone())
            .branching_chain("Explain", &IndexMap::new(), |_| "missing".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::UnknownBranch(ref b) if b == "missing"));
        assert_eq!(err.to_string(), "branch 'missing' not found in available branches");
        assert_eq!(oracle.calls(), 1);
    }
}
