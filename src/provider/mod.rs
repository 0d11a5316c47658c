//! Model backend abstraction.
//!
//! Every backend implements the same capability: take a goal plus context,
//! return one shell command. Backends differ only in wire shape and in how
//! their failures map onto [`ProviderError`]; the orchestrator never needs
//! to know which one is active.

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::Config;
use crate::context::Context;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Normalized failure taxonomy shared by all backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0} API key not configured")]
    KeyNotConfigured(String),
    #[error("Invalid {0} API key")]
    InvalidKey(String),
    #[error("{0} API rate limit exceeded")]
    RateLimited(String),
    #[error("Model '{model}' not found in {backend}")]
    ModelNotFound { backend: String, model: String },
    #[error("{backend} API error: {status}")]
    ApiStatus { backend: String, status: u16 },
    #[error("{0} API request timed out")]
    Timeout(String),
    #[error("Cannot connect to {backend} at {host}. {hint}")]
    Unreachable {
        backend: String,
        host: String,
        hint: String,
    },
    #[error("No response from {0}")]
    EmptyResponse(String),
    #[error("{backend} provider error: {message}")]
    Other { backend: String, message: String },
    #[error("no command generated")]
    NoCommand,
}

/// A backend that turns a natural-language goal into one shell command.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn suggest(&self, goal: &str, context: &Context) -> Result<String, ProviderError>;
}

/// Instantiate the backend named by the configuration.
pub fn build_provider(config: &Config) -> Result<Box<dyn AiProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiProvider::new(
            &config.openai_api_key,
            &config.openai_model,
        )?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(
            &config.ollama_host,
            &config.ollama_model,
        )?)),
        "mock" => Ok(Box::new(MockProvider)),
        other => Err(anyhow!("Unknown provider: {other}")),
    }
}

/// Fixed instruction given to every backend.
pub(crate) fn system_prompt() -> &'static str {
    "You are a helpful assistant that converts natural language goals into \
     safe, single-line shell commands for Unix-like systems. \
     Return ONLY the command, no explanation or formatting. \
     Prefer commands with dry-run flags when available. \
     Never return destructive commands without confirmation flags."
}

/// Goal plus the present context facts, one line each, in fixed order.
/// Absent facts are omitted, not rendered as empty placeholders.
pub(crate) fn build_user_prompt(goal: &str, context: &Context) -> String {
    let mut parts = vec![format!("Goal: {goal}")];

    if let Some(cwd) = non_empty_str(context, "cwd") {
        parts.push(format!("Current directory: {cwd}"));
    }
    if let Some(shell) = non_empty_str(context, "shell") {
        parts.push(format!("Shell: {shell}"));
    }
    if let Some(git) = non_empty_str(context, "git") {
        parts.push(format!("Git status: {git}"));
    }
    if let Some(files) = context.get("files_sample").and_then(Value::as_array) {
        let names: Vec<&str> = files.iter().filter_map(Value::as_str).take(10).collect();
        if !names.is_empty() {
            parts.push(format!("Files in directory: {}", names.join(", ")));
        }
    }

    parts.join("\n")
}

fn non_empty_str<'a>(context: &'a Context, key: &str) -> Option<&'a str> {
    context
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Reduce a raw model response to the canonical single-line command:
/// drop code fences, strip stray backticks, keep the first line.
pub(crate) fn clean_command(raw_response: &str) -> String {
    let trimmed = raw_response.trim();
    let mut response = trimmed;

    if trimmed.starts_with("```") {
        if let Some(line) = trimmed
            .lines()
            .find(|line| !line.starts_with("```") && !line.trim().is_empty())
        {
            response = line.trim();
        }
    }

    let response = response.trim_matches('`').trim();
    response.split('\n').next().unwrap_or("").trim().to_string()
}

/// Deterministic offline backend, selected with `provider = "mock"` or
/// `CMDPAL_USE_MOCK=1`. Keeps the CLI and the integration tests hermetic.
pub struct MockProvider;

#[async_trait]
impl AiProvider for MockProvider {
    async fn suggest(&self, goal: &str, _context: &Context) -> Result<String, ProviderError> {
        let goal_lower = goal.to_lowercase();
        let command = if goal_lower.contains("list") && goal_lower.contains("file") {
            "ls -la".to_string()
        } else if goal_lower.contains("disk") || goal_lower.contains("space") {
            "df -h".to_string()
        } else if goal_lower.contains("process") {
            "ps aux".to_string()
        } else if goal_lower.contains("log") {
            "find . -name '*.log'".to_string()
        } else if goal_lower.contains("branch") {
            "git branch --show-current".to_string()
        } else {
            format!("echo {}", shell_words(goal))
        };
        Ok(command)
    }
}

fn shell_words(goal: &str) -> String {
    format!("'{}'", goal.replace('\'', ""))
}
