//! Third-party action executors. Each executor performs exactly one
//! side-effecting call against a provider API with a user's access token.
//! Dispatch is keyed by the (provider, tool) pair; combinations without a
//! registered executor are simply absent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

mod asana;
mod google;

pub use asana::AsanaExecutor;
pub use google::GmailExecutor;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("http error: {0}")]
    Http(String),

    #[error("{provider} API returned {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
}

impl From<reqwest::Error> for ExecutorError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Perform the provider call with the given token and draft parameters.
    /// The returned value is the provider's response body; a body carrying
    /// an "error" key still counts as a failed execution downstream.
    async fn execute(
        &self,
        access_token: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ExecutorError>;
}

/// Dispatch table keyed by (provider, tool).
#[derive(Default)]
pub struct ExecutorSet {
    executors: HashMap<(String, String), Arc<dyn ActionExecutor>>,
}

impl ExecutorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production set: Asana task creation and Gmail send.
    pub fn standard() -> Self {
        let http = reqwest::Client::new();
        let mut set = Self::new();
        set.register(
            "asana",
            "create_asana_task",
            Arc::new(AsanaExecutor::new(http.clone())),
        );
        set.register("google", "send_gmail", Arc::new(GmailExecutor::new(http)));
        set
    }

    pub fn register(&mut self, provider: &str, tool: &str, executor: Arc<dyn ActionExecutor>) {
        self.executors
            .insert((provider.to_string(), tool.to_string()), executor);
    }

    pub fn get(&self, provider: &str, tool: &str) -> Option<Arc<dyn ActionExecutor>> {
        self.executors
            .get(&(provider.to_string(), tool.to_string()))
            .cloned()
    }
}
