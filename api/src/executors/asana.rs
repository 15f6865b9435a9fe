use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{ActionExecutor, ExecutorError};

const ASANA_TASKS_URL: &str = "https://app.asana.com/api/1.0/tasks";

/// Creates one Asana task from a draft's parameters (`name`, `notes`, and
/// optionally `workspace`/`projects` when the model supplied them).
pub struct AsanaExecutor {
    http: reqwest::Client,
}

impl AsanaExecutor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ActionExecutor for AsanaExecutor {
    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(
        &self,
        access_token: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ExecutorError> {
        let name = parameters
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Untitled task");
        let notes = parameters
            .get("notes")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut data = json!({ "name": name, "notes": notes });
        for key in ["workspace", "projects"] {
            if let Some(value) = parameters.get(key) {
                data[key] = value.clone();
            }
        }

        let response = self
            .http
            .post(ASANA_TASKS_URL)
            .bearer_auth(access_token)
            .json(&json!({ "data": data }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExecutorError::Api {
                provider: "asana",
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ExecutorError::Api {
            provider: "asana",
            status: status.as_u16(),
            body: format!("non-JSON response: {e}"),
        })
    }
}
