use serde_json::json;

use crate::util::api_request;

pub async fn ask(api_url: &str, user_id: i64, message: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::POST,
        "/ask-agent",
        Some(json!({ "user_id": user_id, "message": message })),
    )
    .await
}

pub async fn pending(api_url: &str, user_id: i64) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        &format!("/pending-actions/{user_id}"),
        None,
    )
    .await
}

pub async fn approve(api_url: &str, user_id: i64, action_id: i64) -> i32 {
    api_request(
        api_url,
        reqwest::Method::POST,
        "/approve-action",
        Some(json!({ "user_id": user_id, "action_id": action_id })),
    )
    .await
}

pub async fn execute(
    api_url: &str,
    user_id: i64,
    provider: &str,
    tool: &str,
    parameters: serde_json::Value,
) -> i32 {
    api_request(
        api_url,
        reqwest::Method::POST,
        "/execute-action",
        Some(json!({
            "user_id": user_id,
            "provider": provider,
            "tool": tool,
            "parameters": parameters,
        })),
    )
    .await
}
