use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use serde_json::{Map, Value, json};

use super::{ActionExecutor, ExecutorError};

const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Sends one email through the Gmail API from a draft's parameters
/// (`to`, `subject`, `body`).
pub struct GmailExecutor {
    http: reqwest::Client,
}

impl GmailExecutor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// Gmail takes the full RFC-2822 message, base64url-encoded, in `raw`.
fn build_raw_message(to: &str, subject: &str, body: &str) -> String {
    let mime = format!(
        "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
    );
    URL_SAFE.encode(mime)
}

#[async_trait]
impl ActionExecutor for GmailExecutor {
    #[tracing::instrument(level = "info", skip_all)]
    async fn execute(
        &self,
        access_token: &str,
        parameters: &Map<String, Value>,
    ) -> Result<Value, ExecutorError> {
        let to = parameters.get("to").and_then(Value::as_str).unwrap_or_default();
        let subject = parameters
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let body = parameters
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let response = self
            .http
            .post(GMAIL_SEND_URL)
            .bearer_auth(access_token)
            .json(&json!({ "raw": build_raw_message(to, subject, body) }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ExecutorError::Api {
                provider: "google",
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ExecutorError::Api {
            provider: "google",
            status: status.as_u16(),
            body: format!("non-JSON response: {e}"),
        })
    }
}
