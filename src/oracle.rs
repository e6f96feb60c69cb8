//! The generation oracle: prompt in, text out.
//!
//! Every workflow in this crate talks to the model through [`Oracle`] and
//! nothing else. [`ChatOracle`] is the production implementation; it wraps an
//! [`LlmClient`] and transparently resolves tool calls (web search) before
//! handing back the final answer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::llm::{ChatMessage, ChatOptions, LlmClient, LlmError, ToolCall, ToolDefinition};
use crate::tools::Tool;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. You have access to a search tool, but only use it when you need current information or when you're not confident about facts. For general knowledge, common questions, or creative tasks like jokes or stories, respond directly without using the tool.";

#[derive(Debug, Error)]
pub enum OracleError {
    /// Transport, rate limit or provider failure that survived the client's retries.
    #[error("oracle unavailable: {0}")]
    Unavailable(#[from] LlmError),

    #[error("oracle returned no content")]
    EmptyResponse,
}

/// A text-generation capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Shared handle used by every workflow.
pub type SharedOracle = Arc<dyn Oracle>;

/// Model and sampling parameters applied to every call.
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl From<&Config> for OracleSettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model_name.clone(),
            temperature: Some(config.temperature),
            max_tokens: Some(config.max_tokens),
        }
    }
}

/// Oracle backed by a chat-completions model with optional tools.
pub struct ChatOracle {
    client: Arc<dyn LlmClient>,
    settings: OracleSettings,
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: Vec<ToolDefinition>,
}

impl ChatOracle {
    pub fn new(client: Arc<dyn LlmClient>, settings: OracleSettings) -> Self {
        Self {
            client,
            settings,
            tools: HashMap::new(),
            definitions: Vec::new(),
        }
    }

    /// Offer a tool to the model on every first-turn request.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.definitions.push(tool.definition());
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    fn options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Execute one tool call, turning every failure into text for the model.
    async fn run_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.function.name) else {
            tracing::warn!("Model requested unknown tool {}", call.function.name);
            return format!("Error: unknown tool '{}'", call.function.name);
        };

        let raw_args = if call.function.arguments.trim().is_empty() {
            "{}"
        } else {
            call.function.arguments.as_str()
        };
        let args = match serde_json::from_str(raw_args) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Invalid arguments for tool {}: {}", call.function.name, e);
                return format!("Error: invalid arguments: {}", e);
            }
        };

        tracing::info!("Using {} tool...", call.function.name);
        match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", call.function.name, e);
                format!("Error: {}", e)
            }
        }
    }
}

#[async_trait]
impl Oracle for ChatOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let tools = (!self.definitions.is_empty()).then_some(self.definitions.as_slice());

        let first = self
            .client
            .chat_completion_with_options(&self.settings.model, &messages, tools, self.options())
            .await?;

        let calls = first.requested_tool_calls().to_vec();
        if calls.is_empty() {
            tracing::debug!("Responding without tools");
            return first.content.ok_or(OracleError::EmptyResponse);
        }

        messages.push(ChatMessage::assistant_tool_calls(first.content, calls.clone()));
        for call in &calls {
            let output = self.run_tool(call).await;
            messages.push(ChatMessage::tool_result(call, output));
        }

        // Second turn without tools so the model has to answer.
        let second = self
            .client
            .chat_completion_with_options(&self.settings.model, &messages, None, self.options())
            .await?;

        second.content.ok_or(OracleError::EmptyResponse)
    }
}
