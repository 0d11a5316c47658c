//! The suggestion pipeline: one request in, one command (or one normalized
//! failure) out, one audit entry either way.
//!
//! Lifecycle per request: validate goal → collect and merge context →
//! invoke the provider → score → policy rewrite → log → respond. The audit
//! record is written before the result is returned; it is part of the
//! request, not a fire-and-forget side effect.

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::context::{Context, ContextCollector};
use crate::provider::{AiProvider, ProviderError, build_provider};
use crate::safety::Safety;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// How aggressively the pipeline may alter a suggested command.
/// Only `normal` applies the dry-run rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyPolicy {
    #[default]
    Normal,
    Strict,
    Permissive,
}

/// One suggestion request; immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Caller-supplied context fragments; they win over collected facts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default)]
    pub policy: SafetyPolicy,
}

impl SuggestionRequest {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            cwd: None,
            shell: None,
            context: None,
            policy: SafetyPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub command: String,
    pub explanation: String,
    pub risk: f64,
    pub alternatives: Vec<String>,
}

/// The only failures a caller ever sees; everything else degrades inside
/// the pipeline.
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("goal must not be empty")]
    EmptyGoal,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub struct SuggestionPipeline {
    provider: Box<dyn AiProvider>,
    provider_name: String,
    collector: ContextCollector,
    safety: Safety,
    audit: AuditLogger,
}

impl SuggestionPipeline {
    pub fn new(provider: Box<dyn AiProvider>, provider_name: String, audit: AuditLogger) -> Self {
        Self {
            provider,
            provider_name,
            collector: ContextCollector::new(),
            safety: Safety::new(),
            audit,
        }
    }

    /// Wire up the pipeline from resolved configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            build_provider(config)?,
            config.provider.clone(),
            AuditLogger::new(config.expanded_log_path()),
        ))
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResponse, SuggestError> {
        if request.goal.trim().is_empty() {
            return Err(SuggestError::EmptyGoal);
        }

        let cwd = match &request.cwd {
            Some(cwd) => cwd.clone(),
            None => env::current_dir()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_else(|_| ".".to_string()),
        };

        let mut context = self.collector.collect(Some(Path::new(&cwd))).await;
        if let Some(fragments) = &request.context {
            for (key, value) in fragments {
                context.insert(key.clone(), value.clone());
            }
        }
        if let Some(shell) = &request.shell {
            context.insert("shell".to_string(), json!(shell));
        }

        info!(goal = %request.goal, provider = %self.provider_name, "Requesting suggestion");

        let raw_command = match self.provider.suggest(&request.goal, &context).await {
            Ok(command) => command,
            Err(err) => return Err(self.fail(request, &cwd, err)),
        };

        if raw_command.trim().is_empty() {
            return Err(self.fail(request, &cwd, ProviderError::NoCommand));
        }

        let mut command = raw_command.trim().to_string();
        let risk = self.safety.risk_score(&command);

        if request.policy == SafetyPolicy::Normal {
            command = self.safety.rewrite_to_dry_run(&command);
        }

        let explanation = format!("Command to: {}", request.goal);

        self.audit.log_suggestion(
            &request.goal,
            &command,
            &cwd,
            &self.provider_name,
            None,
            None,
            Some(risk),
        );

        Ok(SuggestionResponse {
            command,
            explanation,
            risk,
            alternatives: Vec::new(),
        })
    }

    fn fail(&self, request: &SuggestionRequest, cwd: &str, err: ProviderError) -> SuggestError {
        self.audit
            .log_error(&request.goal, &err.to_string(), cwd, Some(&self.provider_name));
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    use std::sync::{Arc, Mutex};

    struct StubProvider {
        result: Result<String, ProviderError>,
        seen_context: Arc<Mutex<Option<Context>>>,
    }

    impl StubProvider {
        fn new(result: Result<String, ProviderError>) -> Self {
            Self {
                result,
                seen_context: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        async fn suggest(&self, _goal: &str, context: &Context) -> Result<String, ProviderError> {
            *self.seen_context.lock().unwrap() = Some(context.clone());
            self.result.clone()
        }
    }

    fn pipeline_with(
        result: Result<String, ProviderError>,
        dir: &tempfile::TempDir,
    ) -> (SuggestionPipeline, Arc<Mutex<Option<Context>>>) {
        let provider = StubProvider::new(result);
        let seen = Arc::clone(&provider.seen_context);
        let pipeline = SuggestionPipeline::new(
            Box::new(provider),
            "stub".to_string(),
            AuditLogger::new(dir.path().join("audit.jsonl")),
        );
        (pipeline, seen)
    }

    fn request_in(dir: &tempfile::TempDir, goal: &str) -> SuggestionRequest {
        SuggestionRequest {
            cwd: Some(dir.path().to_string_lossy().into_owned()),
            ..SuggestionRequest::new(goal)
        }
    }

    #[tokio::test]
    async fn test_empty_goal_rejected_before_anything_else() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("ls".to_string()), &dir);

        let err = pipeline
            .suggest(&request_in(&dir, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::EmptyGoal));
        // Validation failures are not suggestion attempts; nothing is logged
        assert!(pipeline.audit().recent_entries(10).is_empty());
    }

    #[tokio::test]
    async fn test_success_logs_exactly_one_entry() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("ls -la".to_string()), &dir);

        let response = pipeline
            .suggest(&request_in(&dir, "list files"))
            .await
            .unwrap();
        assert_eq!(response.command, "ls -la");
        assert_eq!(response.explanation, "Command to: list files");
        assert!(response.risk <= 0.2);
        assert!(response.alternatives.is_empty());

        let entries = pipeline.audit().recent_entries(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].command.as_deref(), Some("ls -la"));
        assert_eq!(entries[0].provider.as_deref(), Some("stub"));
        assert!(entries[0].approved.is_none());
    }

    #[tokio::test]
    async fn test_provider_error_logs_error_entry() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Err(ProviderError::Timeout("OpenAI".to_string())), &dir);

        let err = pipeline
            .suggest(&request_in(&dir, "list files"))
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestError::Provider(ProviderError::Timeout(_))));

        let entries = pipeline.audit().recent_entries(10);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].command.is_none());
        assert_eq!(
            entries[0].error.as_deref(),
            Some("OpenAI API request timed out")
        );
    }

    #[tokio::test]
    async fn test_blank_provider_response_is_no_command() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("   ".to_string()), &dir);

        let err = pipeline
            .suggest(&request_in(&dir, "do nothing"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SuggestError::Provider(ProviderError::NoCommand)
        ));

        let entries = pipeline.audit().recent_entries(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].error.as_deref(), Some("no command generated"));
    }

    #[tokio::test]
    async fn test_normal_policy_applies_dry_run_rewrite() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("rsync -av src/ dest/".to_string()), &dir);

        let response = pipeline
            .suggest(&request_in(&dir, "sync directories"))
            .await
            .unwrap();
        assert_eq!(response.command, "rsync --dry-run -av src/ dest/");
    }

    #[tokio::test]
    async fn test_permissive_policy_skips_rewrite() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("rsync -av src/ dest/".to_string()), &dir);

        let mut request = request_in(&dir, "sync directories");
        request.policy = SafetyPolicy::Permissive;
        let response = pipeline.suggest(&request).await.unwrap();
        assert_eq!(response.command, "rsync -av src/ dest/");
    }

    #[tokio::test]
    async fn test_strict_policy_skips_rewrite() {
        let dir = tempdir().unwrap();
        let (pipeline, _seen) = pipeline_with(Ok("cp a b".to_string()), &dir);

        let mut request = request_in(&dir, "copy a to b");
        request.policy = SafetyPolicy::Strict;
        let response = pipeline.suggest(&request).await.unwrap();
        assert_eq!(response.command, "cp a b");
    }

    #[tokio::test]
    async fn test_caller_context_fragments_override_collected() {
        let dir = tempdir().unwrap();
        let (pipeline, seen) = pipeline_with(Ok("ls".to_string()), &dir);

        let mut request = request_in(&dir, "list files");
        let mut fragments = Context::new();
        fragments.insert("git".to_string(), json!("On branch main"));
        fragments.insert("cwd".to_string(), json!("/somewhere/else"));
        request.context = Some(fragments);
        request.shell = Some("fish".to_string());

        pipeline.suggest(&request).await.unwrap();

        let context = seen.lock().unwrap().clone().unwrap();
        // Caller fragments win on key conflict; the shell override wins last
        assert_eq!(context.get("cwd").unwrap(), "/somewhere/else");
        assert_eq!(context.get("git").unwrap(), "On branch main");
        assert_eq!(context.get("shell").unwrap(), "fish");
        // Collected facts without a conflicting fragment survive the merge
        assert!(context.contains_key("os"));
    }

    #[tokio::test]
    async fn test_policy_serde_lowercase() {
        let request: SuggestionRequest =
            serde_json::from_str(r#"{"goal":"x","policy":"strict"}"#).unwrap();
        assert_eq!(request.policy, SafetyPolicy::Strict);

        let request: SuggestionRequest = serde_json::from_str(r#"{"goal":"x"}"#).unwrap();
        assert_eq!(request.policy, SafetyPolicy::Normal);
    }
}
