//! Parallelization: sectioning and voting over the same input.
//!
//! Both modes fan out one oracle call per section (or variation) through a
//! bounded stream and keep results in input order. A reply that cannot be
//! parsed degrades to a zero-confidence placeholder instead of failing the
//! whole batch.

use std::collections::HashSet;

use futures::{stream, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extraction::extract_as;
use crate::oracle::{OracleError, SharedOracle};

const DEFAULT_MAX_WORKERS: usize = 3;

#[derive(Debug, Error)]
pub enum ParallelError {
    #[error("sections must be provided for sectioning parallelization")]
    NoSections,

    #[error("voting config must provide at least one variation")]
    NoVariations,

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone)]
pub struct Section {
    pub name: String,
    pub system_prompt: String,
    pub task_prompt: String,
    pub weight: f64,
}

impl Section {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        task_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            task_prompt: task_prompt.into(),
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    /// Share of positive votes compared against the threshold
    #[default]
    Majority,
    /// Every vote must be positive
    Unanimous,
    /// Confidence-weighted share of positive votes compared against the threshold
    Weighted,
}

#[derive(Debug, Clone)]
pub struct VotingConfig {
    pub prompt: String,
    pub variations: Vec<String>,
    pub threshold: f64,
    pub aggregation: AggregationMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResult {
    pub section_name: String,
    pub analysis: String,
    pub key_points: Vec<String>,
    pub confidence: f64,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
struct SectionReply {
    analysis: String,
    #[serde(default)]
    key_points: Vec<String>,
    confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionAnalysis {
    pub analysis: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectioningReport {
    pub overall_confidence: f64,
    /// Key points from every section, deduplicated in first-seen order
    pub key_points: Vec<String>,
    pub detailed_analysis: IndexMap<String, SectionAnalysis>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vote {
    pub variation: String,
    pub vote: bool,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct VoteReply {
    vote: bool,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VotingReport {
    pub decision: bool,
    /// Mean confidence across all votes
    pub confidence: f64,
    pub vote_ratio: f64,
    pub detailed_votes: Vec<Vote>,
}

pub struct ParallelProcessor {
    oracle: SharedOracle,
    max_workers: usize,
}

impl ParallelProcessor {
    pub fn new(oracle: SharedOracle) -> Self {
        Self {
            oracle,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    /// Bound on in-flight oracle calls. Zero is treated as one.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub async fn process_sections(
        &self,
        input: &str,
        sections: &[Section],
    ) -> Result<SectioningReport, ParallelError> {
        if sections.is_empty() {
            return Err(ParallelError::NoSections);
        }

        let results: Vec<SectionResult> = stream::iter(sections)
            .map(|section| self.process_section(section, input))
            .buffered(self.max_workers)
            .try_collect()
            .await?;

        let summary = self.summarize(&results).await?;
        Ok(aggregate_sections(results, summary))
    }

    pub async fn process_votes(
        &self,
        input: &str,
        config: &VotingConfig,
    ) -> Result<VotingReport, ParallelError> {
        if config.variations.is_empty() {
            return Err(ParallelError::NoVariations);
        }

        let votes: Vec<Vote> = stream::iter(&config.variations)
            .map(|variation| self.process_vote(&config.prompt, variation, input))
            .buffered(self.max_workers)
            .try_collect()
            .await?;

        Ok(aggregate_votes(votes, config))
    }

    async fn process_section(&self, section: &Section, input: &str) -> Result<SectionResult, OracleError> {
        let prompt = format!(
            r#"{}

Input: {}

{}

Provide your response in JSON format with the following structure:
{{
    "analysis": "your detailed analysis",
    "key_points": ["list", "of", "key", "points"],
    "confidence": 0.0 to 1.0
}}"#,
            section.system_prompt, input, section.task_prompt
        );

        let response = self.oracle.generate(&prompt).await?;
        let result = match extract_as::<SectionReply>(&response) {
            Ok(reply) => SectionResult {
                section_name: section.name.clone(),
                analysis: reply.analysis,
                key_points: reply.key_points,
                confidence: reply.confidence,
                weight: section.weight,
            },
            Err(e) => {
                tracing::warn!(section = %section.name, "Error processing section: {}", e);
                SectionResult {
                    section_name: section.name.clone(),
                    analysis: "Error processing section".to_string(),
                    key_points: Vec::new(),
                    confidence: 0.0,
                    weight: section.weight,
                }
            }
        };
        Ok(result)
    }

    async fn process_vote(&self, base_prompt: &str, variation: &str, input: &str) -> Result<Vote, OracleError> {
        let prompt = format!(
            r#"{base_prompt}

Input to analyze: {input}

Specific focus: {variation}

Provide your response in JSON format with the following structure:
{{
    "vote": true/false,
    "confidence": 0.0 to 1.0,
    "reasoning": "explanation for your vote"
}}"#
        );

        let response = self.oracle.generate(&prompt).await?;
        let vote = match extract_as::<VoteReply>(&response) {
            Ok(reply) => Vote {
                variation: variation.to_string(),
                vote: reply.vote,
                confidence: reply.confidence,
                reasoning: reply.reasoning,
            },
            Err(e) => {
                tracing::warn!(variation, "Error processing vote: {}", e);
                Vote {
                    variation: variation.to_string(),
                    vote: false,
                    confidence: 0.0,
                    reasoning: format!("Error processing vote: {}", e),
                }
            }
        };
        Ok(vote)
    }

    async fn summarize(&self, results: &[SectionResult]) -> Result<String, OracleError> {
        let analyses = serde_json::to_string_pretty(results).unwrap_or_default();
        let prompt = format!(
            "Based on the following analyses, provide a concise summary:\n\n{}\n\nProvide a coherent summary that integrates all perspectives.",
            analyses
        );
        self.oracle.generate(&prompt).await
    }
}

fn aggregate_sections(results: Vec<SectionResult>, summary: String) -> SectioningReport {
    let total_weight: f64 = results.iter().map(|r| r.weight).sum();
    let overall_confidence = if total_weight > 0.0 {
        results.iter().map(|r| r.confidence * r.weight).sum::<f64>() / total_weight
    } else {
        0.0
    };

    let mut seen = HashSet::new();
    let mut key_points = Vec::new();
    let mut detailed_analysis = IndexMap::new();
    for result in results {
        for point in result.key_points {
            if seen.insert(point.clone()) {
                key_points.push(point);
            }
        }
        detailed_analysis.insert(
            result.section_name,
            SectionAnalysis {
                analysis: result.analysis,
                confidence: result.confidence,
            },
        );
    }

    SectioningReport {
        overall_confidence,
        key_points,
        detailed_analysis,
        summary,
    }
}

/// Combine votes into a decision. `votes` must be non-empty.
pub(crate) fn aggregate_votes(votes: Vec<Vote>, config: &VotingConfig) -> VotingReport {
    let total = votes.len() as f64;
    let positive = votes.iter().filter(|v| v.vote).count() as f64;
    let total_confidence: f64 = votes.iter().map(|v| v.confidence).sum();
    let vote_ratio = positive / total;

    let decision = match config.aggregation {
        AggregationMethod::Majority => vote_ratio >= config.threshold,
        AggregationMethod::Unanimous => positive == total,
        AggregationMethod::Weighted => {
            let weighted_positive: f64 = votes.iter().filter(|v| v.vote).map(|v| v.confidence).sum();
            total_confidence > 0.0 && weighted_positive / total_confidence >= config.threshold
        }
    };

    VotingReport {
        decision,
        confidence: total_confidence / total,
        vote_ratio,
        detailed_votes: votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::ScriptedOracle;
    use std::sync::Arc;

    fn sections() -> Vec<Section> {
        vec![
            Section::new("technical", "You are a technical analyst.", "Analyze the tech."),
            Section::new("readability", "You are a readability expert.", "Analyze clarity.").with_weight(0.5),
        ]
    }

    fn vote(variation: &str, vote: bool, confidence: f64) -> Vote {
        Vote {
            variation: variation.into(),
            vote,
            confidence,
            reasoning: String::new(),
        }
    }

    fn config(aggregation: AggregationMethod, threshold: f64) -> VotingConfig {
        VotingConfig {
            prompt: "You are a content moderator.".into(),
            variations: vec!["hate speech".into(), "adult content".into(), "harm".into()],
            threshold,
            aggregation,
        }
    }

    #[tokio::test]
    async fn test_sectioning_aggregates_in_order() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .when(
                    "technical analyst",
                    r#"{"analysis": "sound", "key_points": ["accurate", "dense"], "confidence": 0.9}"#,
                )
                .when(
                    "readability expert",
                    r#"{"analysis": "clear", "key_points": ["dense", "short"], "confidence": 0.6}"#,
                )
                .when("provide a concise summary", "Good overall."),
        );

        let report = ParallelProcessor::new(oracle.clone())
            .process_sections("ML text", &sections())
            .await
            .unwrap();

        assert!((report.overall_confidence - 0.8).abs() < 1e-9);
        assert_eq!(report.key_points, vec!["accurate", "dense", "short"]);
        assert_eq!(report.detailed_analysis.keys().collect::<Vec<_>>(), vec!["technical", "readability"]);
        assert_eq!(report.summary, "Good overall.");
        assert_eq!(oracle.calls(), 3);
        assert!(oracle.prompts()[2].contains(r#""section_name": "technical""#));
    }

    #[tokio::test]
    async fn test_unparsable_section_becomes_placeholder() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .when("technical analyst", r#"{"analysis": "sound", "key_points": [], "confidence": 1.0}"#)
                .when("readability expert", "cannot comply")
                .when("provide a concise summary", "Partial."),
        );

        let report = ParallelProcessor::new(oracle)
            .with_max_workers(1)
            .process_sections("text", &sections())
            .await
            .unwrap();

        let readability = &report.detailed_analysis["readability"];
        assert_eq!(readability.analysis, "Error processing section");
        assert_eq!(readability.confidence, 0.0);
        assert!((report.overall_confidence - 1.0 / 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let oracle = Arc::new(ScriptedOracle::new().otherwise("{}"));
        let processor = ParallelProcessor::new(oracle.clone());

        assert!(matches!(
            processor.process_sections("x", &[]).await,
            Err(ParallelError::NoSections)
        ));
        let mut empty = config(AggregationMethod::Majority, 0.5);
        empty.variations.clear();
        assert!(matches!(
            processor.process_votes("x", &empty).await,
            Err(ParallelError::NoVariations)
        ));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_voting_keeps_variation_order() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .when("Specific focus: hate speech", r#"{"vote": true, "confidence": 0.9, "reasoning": "clean"}"#)
                .when("Specific focus: adult content", "garbled")
                .when("Specific focus: harm", r#"{"vote": true, "confidence": 0.6}"#),
        );

        let report = ParallelProcessor::new(oracle)
            .process_votes("text", &config(AggregationMethod::Majority, 0.6))
            .await
            .unwrap();

        let order: Vec<_> = report.detailed_votes.iter().map(|v| v.variation.as_str()).collect();
        assert_eq!(order, vec!["hate speech", "adult content", "harm"]);
        assert!(!report.detailed_votes[1].vote);
        assert!(report.detailed_votes[1].reasoning.starts_with("Error processing vote:"));
        assert!((report.vote_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert!(report.decision);
        assert!((report.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_methods() {
        let votes = || vec![vote("a", true, 0.9), vote("b", true, 0.8), vote("c", false, 0.3)];

        assert!(aggregate_votes(votes(), &config(AggregationMethod::Majority, 0.6)).decision);
        assert!(!aggregate_votes(votes(), &config(AggregationMethod::Majority, 0.7)).decision);
        assert!(!aggregate_votes(votes(), &config(AggregationMethod::Unanimous, 0.0)).decision);
        // 1.7 / 2.0
        assert!(aggregate_votes(votes(), &config(AggregationMethod::Weighted, 0.8)).decision);
        assert!(!aggregate_votes(votes(), &config(AggregationMethod::Weighted, 0.9)).decision);

        let all_yes = vec![vote("a", true, 0.5), vote("b", true, 0.5)];
        assert!(aggregate_votes(all_yes, &config(AggregationMethod::Unanimous, 1.0)).decision);
    }

    #[test]
    fn test_weighted_with_zero_confidence_is_negative() {
        let votes = vec![vote("a", true, 0.0), vote("b", false, 0.0)];
        let report = aggregate_votes(votes, &config(AggregationMethod::Weighted, 0.1));
        assert!(!report.decision);
        assert_eq!(report.confidence, 0.0);
    }
}
