//! Routing: classify an input against named routes, answer with the winner.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::extraction::extract_as;
use crate::oracle::{OracleError, SharedOracle};

const UNCATEGORIZED_REPLY: &str = "I apologize, but I'm unable to properly categorize your request. Could you please rephrase or provide more details?";
const UNPROCESSED_REPLY: &str = "I apologize, but I'm unable to properly process your request at this time.";
const NO_ROUTES_REPLY: &str = "No suitable routes found for your request.";

/// A destination the router can send input to.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub response_template: String,
    /// Minimum classifier confidence for this route to be used
    pub confidence_threshold: f64,
    pub priority: i64,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        response_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            response_template: response_template.into(),
            confidence_threshold: 0.5,
            priority: 0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteStrategy {
    /// Answer with the top recommendation only
    #[default]
    Single,
    /// Answer with every recommendation that clears its threshold
    Multi,
    /// Try recommendations by route priority until one succeeds
    Priority,
}

/// One entry of the classifier's reply.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRecommendation {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RoutingReply {
    #[serde(default)]
    routes: Vec<RouteRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoutedResponse {
    Single(String),
    Multi(Vec<String>),
}

pub struct WorkflowRouter {
    oracle: SharedOracle,
    strategy: RouteStrategy,
    routes: IndexMap<String, Route>,
}

impl WorkflowRouter {
    pub fn new(oracle: SharedOracle, strategy: RouteStrategy) -> Self {
        Self {
            oracle,
            strategy,
            routes: IndexMap::new(),
        }
    }

    /// Register a route, replacing any route with the same name.
    pub fn add_route(&mut self, route: Route) {
        self.routes.insert(route.name.clone(), route);
    }

    pub fn routing_prompt(&self, input: &str) -> String {
        let routes = self
            .routes
            .values()
            .map(|r| format!("- {}: {}", r.name, r.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Given the following input, determine the most appropriate routing(s).

Available routes:
{routes}

Respond in the following JSON format:
{{
    "routes": [
        {{
            "name": "route_name",
            "confidence": 0.0 to 1.0,
            "reasoning": "brief explanation"
        }}
    ]
}}

Input text: {input}

Provide route recommendations in order of confidence."#
        )
    }

    /// Parse the classifier reply. Anything unusable yields no recommendations.
    pub fn parse_recommendations(response: &str) -> Vec<RouteRecommendation> {
        match extract_as::<RoutingReply>(response) {
            Ok(reply) => reply.routes,
            Err(e) => {
                tracing::warn!("Error parsing route response: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn process_input(&self, input: &str) -> Result<RoutedResponse, OracleError> {
        let response = self.oracle.generate(&self.routing_prompt(input)).await?;
        let recommendations = Self::parse_recommendations(&response);
        tracing::debug!(
            strategy = ?self.strategy,
            recommendations = recommendations.len(),
            "Routing reply parsed"
        );

        if recommendations.is_empty() {
            return Ok(RoutedResponse::Single(UNCATEGORIZED_REPLY.to_string()));
        }

        match self.strategy {
            RouteStrategy::Single => {
                if let Some(route) = self.accepted(&recommendations[0]) {
                    return Ok(RoutedResponse::Single(self.respond(input, route).await?));
                }
            }
            RouteStrategy::Multi => {
                let mut responses = Vec::new();
                for rec in &recommendations {
                    if let Some(route) = self.accepted(rec) {
                        responses.push(self.respond(input, route).await?);
                    }
                }
                if responses.is_empty() {
                    responses.push(NO_ROUTES_REPLY.to_string());
                }
                return Ok(RoutedResponse::Multi(responses));
            }
            RouteStrategy::Priority => {
                let mut ordered = recommendations;
                ordered.sort_by_key(|rec| {
                    std::cmp::Reverse(self.routes.get(&rec.name).map_or(0, |r| r.priority))
                });

                for rec in &ordered {
                    let Some(route) = self.accepted(rec) else {
                        continue;
                    };
                    match self.respond(input, route).await {
                        Ok(text) => return Ok(RoutedResponse::Single(text)),
                        Err(e) => tracing::warn!(route = %rec.name, "Handler failed: {}", e),
                    }
                }
            }
        }

        Ok(RoutedResponse::Single(UNPROCESSED_REPLY.to_string()))
    }

    fn accepted(&self, rec: &RouteRecommendation) -> Option<&Route> {
        self.routes
            .get(&rec.name)
            .filter(|route| rec.confidence >= route.confidence_threshold)
    }

    async fn respond(&self, input: &str, route: &Route) -> Result<String, OracleError> {
        tracing::info!(route = %route.name, "Routing input");
        let prompt = format!(
            "{}\n\nUser Input: {}\n\n{}",
            route.system_prompt, input, route.response_template
        );
        self.oracle.generate(&prompt).await
    }
}
