//! Language-model seam. The orchestrator depends on the `LanguageModel`
//! trait; `OllamaClient` talks to an Ollama runtime over HTTP. One call per
//! turn, no retries; a failed invocation is absorbed at the turn boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Request a JSON-formatted completion for `prompt`. Returns the raw
    /// completion text. Callers normalize it, never trust it.
    async fn complete_json(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    format: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

}

#[async_trait]
impl LanguageModel for OllamaClient {
    #[tracing::instrument(level = "info", skip_all)]
    async fn complete_json(&self, prompt: &str) -> Result<String, LlmError> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            format: "json",
            stream: false,
        };

        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "ollama generate status={status} body={body}"
            )));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        Ok(parsed.response)
    }
}
