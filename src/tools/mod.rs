//! Tools the oracle may invoke while answering a prompt.
//!
//! The model decides on its own whether to call a tool; callers of the
//! oracle never see tool traffic, only the final answer.

mod search;

pub use search::{SearchDepth, TavilySearch};

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};

/// A function exposed to the model through the chat-completions tool API.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name the model uses to call this tool.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with already-decoded arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;

    /// Definition sent to the provider.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}
