//! Web search through the Tavily API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Tool;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: u32 = 5;

/// How hard Tavily should look: `basic` is faster, `advanced` more thorough.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

/// Search the web for real-time information.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: TAVILY_SEARCH_URL.to_string(),
        }
    }

    /// Point the tool at a different endpoint (self-hosted proxy, test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn search(&self, query: &str, depth: SearchDepth) -> anyhow::Result<SearchResponse> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: depth,
            include_answer: true,
            include_raw_content: false,
            max_results: MAX_RESULTS,
        };

        tracing::debug!("Tavily search: query={:?}, depth={:?}", query, depth);

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Search failed with HTTP {}: {}", status, body));
        }

        Ok(response.json::<SearchResponse>().await?)
    }
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the web for real-time information about any topic. Only use this when you need up-to-date information or facts you're not confident about."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "search_depth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "description": "The depth of search - basic is faster, advanced is more comprehensive"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let depth = match args.get("search_depth") {
            Some(Value::Null) | None => SearchDepth::default(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|_| anyhow::anyhow!("Invalid 'search_depth': {}", v))?,
        };

        let response = self.search(query, depth).await?;
        Ok(response.render(query))
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    include_answer: bool,
    include_raw_content: bool,
    max_results: u32,
}

/// Subset of the Tavily response we surface to the model.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl SearchResponse {
    /// Plain-text rendering fed back to the model as the tool result.
    pub fn render(&self, query: &str) -> String {
        if self.answer.is_none() && self.results.is_empty() {
            return format!("No results found for: {}", query);
        }

        let mut sections = Vec::new();
        if let Some(answer) = self.answer.as_deref().filter(|a| !a.trim().is_empty()) {
            sections.push(format!("Answer: {}", answer.trim()));
        }
        for hit in &self.results {
            sections.push(format!("**{}**\n{}\nURL: {}", hit.title, hit.content.trim(), hit.url));
        }
        sections.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_answer_and_hits() {
        let response: SearchResponse = serde_json::from_value(json!({
            "query": "rust 2024 edition",
            "answer": "It shipped with Rust 1.85.",
            "results": [
                {"title": "Announcing Rust 1.85", "url": "https://blog.rust-lang.org", "content": "The 2024 edition is stable.", "score": 0.9}
            ]
        }))
        .unwrap();

        let text = response.render("rust 2024 edition");
        assert!(text.starts_with("Answer: It shipped with Rust 1.85."));
        assert!(text.contains("**Announcing Rust 1.85**"));
        assert!(text.contains("URL: https://blog.rust-lang.org"));
    }

    #[test]
    fn test_render_empty() {
        let response: SearchResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert_eq!(response.render("nothing"), "No results found for: nothing");
    }

    #[test]
    fn test_request_shape() {
        let request = SearchRequest {
            api_key: "tvly-key",
            query: "q",
            search_depth: SearchDepth::Advanced,
            include_answer: true,
            include_raw_content: false,
            max_results: MAX_RESULTS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["search_depth"], "advanced");
        assert_eq!(json["max_results"], 5);
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_arguments() {
        let tool = TavilySearch::new("tvly-key".into()).with_endpoint("http://127.0.0.1:9");

        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("query"));

        let err = tool
            .execute(json!({"query": "x", "search_depth": "deep"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("search_depth"));
    }

    #[test]
    fn test_definition() {
        let def = TavilySearch::new("k".into()).definition();
        assert_eq!(def.tool_type, "function");
        assert_eq!(def.function.name, "search");
        assert_eq!(def.function.parameters["required"][0], "query");
    }
}
