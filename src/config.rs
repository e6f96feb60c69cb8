//! Runtime configuration.
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file. Variables already set in the environment win over the file.
//! Keys are matched case-insensitively.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::llm::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u64 = 1000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Settings for the oracle client and the surrounding binary.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    /// Base URL of an OpenAI-compatible API (no trailing `/chat/completions`)
    pub base_url: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub debug_mode: bool,
    pub log_level: String,
    /// Enables the web search tool when present
    pub tavily_api_key: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("debug_mode", &self.debug_mode)
            .field("log_level", &self.log_level)
            .field(
                "tavily_api_key",
                &self.tavily_api_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Config {
    /// Load from the environment, seeding it from `env_file` or, when no
    /// path is given, from a `.env` in the working directory if one exists.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)?;
                tracing::info!("Loaded environment from {}", path.display());
            }
            None => match dotenvy::dotenv() {
                Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
                Err(e) if e.not_found() => {
                    tracing::debug!("No .env file found, using process environment")
                }
                Err(e) => return Err(e.into()),
            },
        }

        Self::from_vars(std::env::vars())
    }

    /// Load from a `.env` file alone, ignoring the process environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let vars = dotenvy::from_path_iter(path)?.collect::<Result<Vec<_>, _>>()?;
        Self::from_vars(vars)
    }

    /// Build from key/value pairs. Later duplicates of a key win.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_ascii_uppercase(), v))
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let openai_api_key = get("OPENAI_API_KEY")
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?
            .to_string();

        Ok(Self {
            openai_api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or(DEFAULT_BASE_URL).to_string(),
            model_name: get("MODEL_NAME").unwrap_or(DEFAULT_MODEL).to_string(),
            temperature: parse_or("TEMPERATURE", get("TEMPERATURE"), DEFAULT_TEMPERATURE)?,
            max_tokens: parse_or("MAX_TOKENS", get("MAX_TOKENS"), DEFAULT_MAX_TOKENS)?,
            debug_mode: parse_bool("DEBUG_MODE", get("DEBUG_MODE"))?,
            log_level: get("LOG_LEVEL").unwrap_or(DEFAULT_LOG_LEVEL).to_lowercase(),
            tavily_api_key: get("TAVILY_API_KEY").map(str::to_string),
        })
    }

    /// Filter directive for `tracing-subscriber` when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        if self.debug_mode {
            "debug".to_string()
        } else {
            self.log_level.clone()
        }
    }
}

fn parse_or<T>(key: &'static str, raw: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, raw: Option<&str>) -> Result<bool, ConfigError> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
