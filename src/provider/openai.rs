//! Hosted chat-completions backend.

use super::{AiProvider, ProviderError, build_user_prompt, clean_command, system_prompt};
use crate::context::Context;
use crate::http_transport::{HttpError, HttpTransport, ReqwestTransport};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "OpenAI";
const BASE_URL: &str = "https://api.openai.com/v1";
const PLACEHOLDER_KEY: &str = "sk-REPLACE_ME";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    transport: Box<dyn HttpTransport>,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        Ok(Self::with_transport(
            api_key,
            model,
            Box::new(ReqwestTransport::new(REQUEST_TIMEOUT)?),
        ))
    }

    pub fn with_transport(api_key: &str, model: &str, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: BASE_URL.to_string(),
            transport,
        }
    }

    fn map_transport_error(err: HttpError) -> ProviderError {
        match err {
            HttpError::Timeout => ProviderError::Timeout(BACKEND.to_string()),
            HttpError::Connect(message) | HttpError::Other(message) => ProviderError::Other {
                backend: BACKEND.to_string(),
                message,
            },
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
    async fn suggest(&self, goal: &str, context: &Context) -> Result<String, ProviderError> {
        if self.api_key.is_empty() || self.api_key == PLACEHOLDER_KEY {
            return Err(ProviderError::KeyNotConfigured(BACKEND.to_string()));
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt()},
                {"role": "user", "content": build_user_prompt(goal, context)},
            ],
            "max_tokens": 100,
            "temperature": 0.1,
        });

        let authorization = format!("Bearer {}", self.api_key);
        let response = self
            .transport
            .post_json(
                &format!("{}/chat/completions", self.base_url),
                &[
                    ("Authorization", authorization.as_str()),
                    ("Content-Type", "application/json"),
                ],
                &payload,
            )
            .await
            .map_err(Self::map_transport_error)?;

        match response.status {
            200..=299 => {}
            401 => return Err(ProviderError::InvalidKey(BACKEND.to_string())),
            429 => return Err(ProviderError::RateLimited(BACKEND.to_string())),
            status => {
                return Err(ProviderError::ApiStatus {
                    backend: BACKEND.to_string(),
                    status,
                });
            }
        }

        let data: Value =
            serde_json::from_str(&response.body).map_err(|err| ProviderError::Other {
                backend: BACKEND.to_string(),
                message: err.to_string(),
            })?;

        let raw_command = data
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.pointer("/message/content"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::EmptyResponse(BACKEND.to_string()))?;

        debug!("OpenAI raw response: {raw_command}");
        Ok(clean_command(raw_command))
    }
}
