//! Single-oracle workflow patterns.
//!
//! Each pattern composes plain `generate` calls on a [`SharedOracle`]
//! (see [`crate::oracle`]); none of them keep state between invocations.
//!
//! - [`PromptChainer`]: feed one response into the next prompt
//! - [`WorkflowRouter`]: classify the input, then answer with the matching route
//! - [`ParallelProcessor`]: fan the input out to sections or voters and aggregate
//! - [`EvaluatorOptimizer`]: generate, score against criteria, regenerate
//!
//! The dependency-graph pattern lives in [`crate::orchestrator`].
//!
//! [`SharedOracle`]: crate::oracle::SharedOracle

mod chaining;
mod evaluator;
mod parallel;
mod routing;

pub use chaining::{BranchResult, ChainError, ChainPath, ConditionalResult, ParallelChainResult, PromptChainer};
pub use evaluator::{
    CriterionImprovement, EvaluationCriteria, EvaluationResult, EvaluationType, EvaluatorOptimizer,
    ImprovementSummary, Iteration, OptimizationResult,
};
pub use parallel::{
    AggregationMethod, ParallelError, ParallelProcessor, Section, SectionAnalysis, SectionResult,
    SectioningReport, Vote, VotingConfig, VotingReport,
};
pub use routing::{Route, RouteRecommendation, RouteStrategy, RoutedResponse, WorkflowRouter};
