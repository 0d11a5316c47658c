//! Local-inference backend speaking the Ollama generate API.
//!
//! Local inference is slow compared to a hosted API, so the timeout is
//! twice the hosted one. The generate endpoint takes a single prompt, so
//! the system and user instructions are concatenated.

use super::{AiProvider, ProviderError, build_user_prompt, clean_command, system_prompt};
use crate::context::Context;
use crate::http_transport::{HttpError, HttpTransport, ReqwestTransport};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "Ollama";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OllamaProvider {
    host: String,
    model: String,
    transport: Box<dyn HttpTransport>,
}

impl OllamaProvider {
    pub fn new(host: &str, model: &str) -> Result<Self> {
        Ok(Self::with_transport(
            host,
            model,
            Box::new(ReqwestTransport::new(REQUEST_TIMEOUT)?),
        ))
    }

    pub fn with_transport(host: &str, model: &str, transport: Box<dyn HttpTransport>) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            model: model.to_string(),
            transport,
        }
    }

    fn map_transport_error(&self, err: HttpError) -> ProviderError {
        match err {
            HttpError::Timeout => ProviderError::Timeout(BACKEND.to_string()),
            HttpError::Connect(_) => ProviderError::Unreachable {
                backend: BACKEND.to_string(),
                host: self.host.clone(),
                hint: "Make sure Ollama is running with 'ollama serve'".to_string(),
            },
            HttpError::Other(message) => ProviderError::Other {
                backend: BACKEND.to_string(),
                message,
            },
        }
    }
}

#[async_trait]
impl AiProvider for OllamaProvider {
    async fn suggest(&self, goal: &str, context: &Context) -> Result<String, ProviderError> {
        let full_prompt = format!("{}\n\n{}", system_prompt(), build_user_prompt(goal, context));

        let payload = json!({
            "model": self.model,
            "prompt": full_prompt,
            "stream": false,
            "options": {
                "temperature": 0.1,
                "num_predict": 50,
            },
        });

        let response = self
            .transport
            .post_json(&format!("{}/api/generate", self.host), &[], &payload)
            .await
            .map_err(|err| self.map_transport_error(err))?;

        match response.status {
            200..=299 => {}
            404 => {
                return Err(ProviderError::ModelNotFound {
                    backend: BACKEND.to_string(),
                    model: self.model.clone(),
                });
            }
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
            .get("response")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::EmptyResponse(BACKEND.to_string()))?;

        debug!("Ollama raw response: {raw_command}");
        Ok(clean_command(raw_command))
    }
}
