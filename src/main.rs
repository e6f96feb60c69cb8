//! Command-line runner for the workflow demos.
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing_subscriber::{prelude::*, EnvFilter};

use agent_workflows::llm::OpenAiClient;
use agent_workflows::oracle::OracleSettings;
use agent_workflows::orchestrator::DispatchMode;
use agent_workflows::tools::TavilySearch;
use agent_workflows::workflow::{
    AggregationMethod, EvaluationCriteria, EvaluationType, EvaluatorOptimizer, ParallelProcessor,
    PromptChainer, Route, RouteStrategy, Section, VotingConfig, WorkflowRouter,
};
use agent_workflows::{ChatOracle, Config, Orchestrator, SharedOracle};

const DEFAULT_CODE_TASK: &str = "Add input validation to the user registration form in our web app.
The form should validate:
- Email format
- Password strength (min 8 chars, numbers, special chars)
- Username (alphanumeric, 3-20 chars)
Update both frontend validation and backend API validation.";

/// Run one of the agent workflow demos against an OpenAI-compatible model
#[derive(Parser, Debug)]
#[command(name = "agent-workflows")]
#[command(version)]
struct Args {
    /// Which workflow to run
    #[arg(value_enum, default_value_t = Example::PromptChaining)]
    example: Example,

    /// Task description for the orchestration demo
    #[arg(long, value_name = "TEXT")]
    task: Option<String>,

    /// Run independent subtasks (or parallel sections) N at a time
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Load settings from this .env file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Example {
    PromptChaining,
    Routing,
    Parallelization,
    Orchestration,
    EvaluatorOptimizer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.env_file.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config)?;
    tracing::debug!(?config, "Configuration loaded");

    let oracle = build_oracle(&config);

    let output = match args.example {
        Example::PromptChaining => prompt_chaining(oracle).await?,
        Example::Routing => routing(oracle).await?,
        Example::Parallelization => parallelization(oracle, args.concurrency).await?,
        Example::Orchestration => {
            let task = args.task.as_deref().unwrap_or(DEFAULT_CODE_TASK);
            orchestration(oracle, task, args.concurrency).await?
        }
        Example::EvaluatorOptimizer => evaluator_optimizer(oracle).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.log_filter());
    let env_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter: {}", directive))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .init();
    Ok(())
}

fn build_oracle(config: &Config) -> SharedOracle {
    let client = Arc::new(OpenAiClient::new(config.openai_api_key.clone(), &config.base_url));
    let oracle = ChatOracle::new(client, OracleSettings::from(config));

    let oracle = match &config.tavily_api_key {
        Some(key) => oracle.with_tool(Arc::new(TavilySearch::new(key.clone()))),
        None => {
            tracing::info!("TAVILY_API_KEY not set, web search disabled");
            oracle
        }
    };
    Arc::new(oracle)
}

async fn prompt_chaining(oracle: SharedOracle) -> Result<Value> {
    let chainer = PromptChainer::new(oracle);

    let sequential = chainer
        .sequential_chain(
            &[
                "Write a short story about a robot",
                "Transform the previous story into a poem",
                "Create a movie script outline based on the poem",
            ],
            "",
        )
        .await
        .context("Sequential chain failed")?;

    let parallel = chainer
        .parallel_chain(
            "Explain the concept of machine learning",
            &[
                "What are the potential applications in healthcare?",
                "What are the ethical considerations?",
                "How might this impact employment?",
            ],
        )
        .await
        .context("Parallel chain failed")?;

    let positive_words = ["good", "great", "excellent", "positive", "wonderful"];
    let conditional = chainer
        .conditional_chain(
            "What do you think about the future of AI?",
            |text| {
                let text = text.to_lowercase();
                positive_words.iter().any(|w| text.contains(w))
            },
            "Elaborate on these positive aspects",
            "What solutions would you propose for these concerns?",
        )
        .await
        .context("Conditional chain failed")?;

    let barely_longer = |prev: &str, new: &str| new.len() as f64 <= prev.len() as f64 * 1.1;
    let refinement = chainer
        .iterative_refinement_chain(
            "Explain quantum computing",
            "Make this explanation more detailed and precise",
            3,
            Some(&barely_longer),
        )
        .await
        .context("Refinement chain failed")?;

    let mut branches = IndexMap::new();
    branches.insert(
        "technical".to_string(),
        vec![
            "Explain the technical architecture".to_string(),
            "Discuss implementation challenges".to_string(),
            "Provide code examples".to_string(),
        ],
    );
    branches.insert(
        "general".to_string(),
        vec![
            "Explain in simple terms".to_string(),
            "Give real-world analogies".to_string(),
            "Provide practical applications".to_string(),
        ],
    );
    let branching = chainer
        .branching_chain("Explain how neural networks work", &branches, |response| {
            let branch = if response.to_lowercase().contains("technical") {
                "technical"
            } else {
                "general"
            };
            branch.to_string()
        })
        .await
        .context("Branching chain failed")?;

    Ok(json!({
        "sequential": sequential,
        "parallel": parallel,
        "conditional": conditional,
        "refinement": refinement,
        "branching": branching,
    }))
}

async fn routing(oracle: SharedOracle) -> Result<Value> {
    let mut router = WorkflowRouter::new(oracle, RouteStrategy::Single);
    router.add_route(
        Route::new(
            "technical_support",
            "Technical issues, error messages, or software/hardware problems",
            "You are a technical support specialist. Your role is to:
1. Identify the technical issue
2. Provide step-by-step troubleshooting
3. Explain solutions in clear, technical but accessible language",
            "Please provide a detailed technical support response including:
1. Problem identification
2. Step-by-step troubleshooting steps
3. Additional recommendations",
        )
        .with_threshold(0.7),
    );
    router.add_route(
        Route::new(
            "customer_service",
            "General inquiries, account issues, or policy questions",
            "You are a customer service representative. Your role is to:
1. Address customer concerns empathetically
2. Provide clear policy information
3. Offer solutions that align with company policies",
            "Please provide a customer-friendly response that:
1. Acknowledges the customer's concern
2. Explains relevant policies
3. Offers clear next steps",
        )
        .with_threshold(0.6),
    );
    router.add_route(
        Route::new(
            "sales",
            "Product inquiries, pricing questions, or purchase intentions",
            "You are a sales representative. Your role is to:
1. Understand customer needs
2. Explain product benefits
3. Provide relevant pricing and purchasing information",
            "Please provide a sales-focused response that:
1. Addresses the customer's interest
2. Highlights relevant benefits
3. Provides clear pricing/purchase information",
        )
        .with_threshold(0.6),
    );

    let input = "My laptop won't turn on after the latest update";
    let response = router.process_input(input).await.context("Routing failed")?;
    Ok(json!({ "input": input, "response": response }))
}

async fn parallelization(oracle: SharedOracle, concurrency: Option<usize>) -> Result<Value> {
    let mut processor = ParallelProcessor::new(oracle);
    if let Some(n) = concurrency {
        processor = processor.with_max_workers(n);
    }

    let content = "Machine learning algorithms have revolutionized data analysis. \
Neural networks can process complex patterns in datasets, \
enabling applications from image recognition to natural language processing.";

    let sections = [
        Section::new(
            "technical_analysis",
            "You are a technical content analyst focusing on accuracy and technical depth.",
            "Analyze the technical aspects of this content:",
        ),
        Section::new(
            "readability_analysis",
            "You are a readability expert focusing on clarity and accessibility.",
            "Analyze the readability and clarity of this content:",
        )
        .with_weight(0.8),
        Section::new(
            "engagement_analysis",
            "You are an engagement specialist focusing on user interest and appeal.",
            "Analyze the engagement potential of this content:",
        )
        .with_weight(0.6),
    ];
    let sectioning = processor
        .process_sections(content, &sections)
        .await
        .context("Sectioning failed")?;

    let voting_config = VotingConfig {
        prompt: "You are a content moderator. Review the following content for appropriateness.".into(),
        variations: vec![
            "Focus on hate speech and discriminatory content".into(),
            "Focus on explicit adult content or inappropriate themes".into(),
            "Focus on potentially harmful or dangerous information".into(),
        ],
        threshold: 0.7,
        aggregation: AggregationMethod::Weighted,
    };
    let voting = processor
        .process_votes(content, &voting_config)
        .await
        .context("Voting failed")?;

    Ok(json!({ "sectioning": sectioning, "voting": voting }))
}

async fn orchestration(oracle: SharedOracle, task: &str, concurrency: Option<usize>) -> Result<Value> {
    let mode = match concurrency {
        Some(max_workers) => DispatchMode::Concurrent { max_workers },
        None => DispatchMode::Sequential,
    };
    let orchestrator = Orchestrator::with_dispatch_mode(oracle, mode);

    let result = orchestrator
        .process_task(task)
        .await
        .context("Orchestration failed")?;

    let failed = result.failed_subtasks().count();
    if failed > 0 {
        tracing::warn!(failed, "Some subtasks failed");
    }
    Ok(serde_json::to_value(result)?)
}

async fn evaluator_optimizer(oracle: SharedOracle) -> Result<Value> {
    let criteria = vec![
        EvaluationCriteria::new("accuracy", "Accuracy of meaning translation", 1.0),
        EvaluationCriteria::new("fluency", "Natural flow in target language", 0.8),
        EvaluationCriteria::new("cultural_adaptation", "Appropriate cultural context adaptation", 0.6),
    ];
    let optimizer = EvaluatorOptimizer::new(oracle, EvaluationType::Translation, criteria)
        .with_max_iterations(3)
        .with_target_score(0.9);

    let task = "Translate the following English text to French, maintaining the professional tone:
'Our innovative approach to artificial intelligence combines cutting-edge technology
with ethical considerations, ensuring responsible development of AI solutions.'";

    let result = optimizer
        .optimize(task, None)
        .await
        .context("Optimization failed")?;
    Ok(serde_json::to_value(result)?)
}
