//! # Agent Workflows
//!
//! Orchestration patterns built on a single text-generation oracle.
//!
//! This library provides:
//! - An orchestrator-workers engine that plans a task into a dependency graph,
//!   executes it wave by wave, and synthesizes one answer
//! - Chaining, routing, parallelization and evaluator-optimizer workflows
//! - An OpenAI-compatible chat client with retries and optional web search
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐
//!   │ Orchestrator │  │  workflow::* │  │  agent-workflows (CLI)   │
//!   └──────┬───────┘  └──────┬───────┘  └────────────┬─────────────┘
//!          └─────────────────┼───────────────────────┘
//!                            ▼
//!                  ┌───────────────────┐
//!                  │  Arc<dyn Oracle>  │   prompt in, text out
//!                  └─────────┬─────────┘
//!                            ▼
//!                  ┌───────────────────┐      ┌──────────────┐
//!                  │    ChatOracle     │ ───▶ │ TavilySearch │
//!                  └─────────┬─────────┘      └──────────────┘
//!                            ▼
//!                  ┌───────────────────┐
//!                  │   OpenAiClient    │   /chat/completions
//!                  └───────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. Planner asks the oracle for subtasks with dependencies
//! 2. Scheduler runs every subtask whose dependencies have outcomes
//! 3. Worker failures to parse become failed outcomes; cycles abort
//! 4. Synthesizer merges all outcomes into the final answer
//!
//! ## Modules
//! - `orchestrator`: planner, scheduler, worker, synthesizer
//! - `task`: subtask and outcome types
//! - `workflow`: the remaining single-oracle patterns
//! - `oracle`: the generation boundary and its chat-backed implementation
//! - `llm`: chat-completions client and error taxonomy
//! - `tools`: tools the oracle may call (web search)
//! - `extraction`: JSON recovery from free-form replies
//! - `config`: environment-driven settings

pub mod config;
pub mod extraction;
pub mod llm;
pub mod oracle;
pub mod orchestrator;
pub mod task;
pub mod tools;
pub mod workflow;

pub use config::Config;
pub use oracle::{ChatOracle, Oracle, OracleError, SharedOracle};
pub use orchestrator::{OrchestrationResult, Orchestrator, OrchestratorError};
