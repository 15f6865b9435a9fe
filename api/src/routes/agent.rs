use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use attache_core::actions::{ActionDraft, PendingAction};
use attache_core::error::ApiError;

use crate::brain::AgentError;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ask-agent", post(ask_agent))
        .route("/pending-actions/{user_id}", get(list_pending_actions))
        .route("/approve-action", post(approve_action))
        .route("/execute-action", post(execute_action))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct AskAgentRequest {
    pub user_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AskAgentResponse {
    pub status: String,
    /// The conversational reply
    pub message: String,
    /// Actions persisted this turn, each annotated with its row id
    pub plan: Vec<ActionDraft>,
    /// True iff the plan is non-empty
    pub requires_approval: bool,
}

/// Process one user message: chat reply plus any drafted actions.
///
/// Never fails: model malformation and transport errors degrade to an
/// apologetic reply with an empty plan.
#[utoipa::path(
    post,
    path = "/ask-agent",
    request_body = AskAgentRequest,
    responses((status = 200, description = "Agent turn result", body = AskAgentResponse)),
    tag = "agent"
)]
pub async fn ask_agent(
    State(state): State<AppState>,
    Json(req): Json<AskAgentRequest>,
) -> Json<AskAgentResponse> {
    let reply = state.brain.respond(req.user_id, &req.message).await;
    let requires_approval = !reply.plan.is_empty();

    Json(AskAgentResponse {
        status: "success".to_string(),
        message: reply.message,
        plan: reply.plan,
        requires_approval,
    })
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct PendingActionsResponse {
    pub status: String,
    pub count: usize,
    pub actions: Vec<PendingAction>,
}

/// All pending actions for a user, most recent first.
#[utoipa::path(
    get,
    path = "/pending-actions/{user_id}",
    params(("user_id" = i64, Path, description = "Owner of the pending actions")),
    responses(
        (status = 200, description = "Pending actions", body = PendingActionsResponse),
        (status = 500, description = "Database failure", body = ApiError)
    ),
    tag = "agent"
)]
pub async fn list_pending_actions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<PendingActionsResponse>, AppError> {
    let actions = state
        .brain
        .pending(user_id)
        .await
        .map_err(agent_error_to_app)?;

    Ok(Json(PendingActionsResponse {
        status: "success".to_string(),
        count: actions.len(),
        actions,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ApproveActionRequest {
    /// Accepted but not checked against the action's owner.
    pub user_id: i64,
    pub action_id: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApproveActionResponse {
    /// "success" or "error"
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
}

/// Approve and execute one pending action.
///
/// Always answers 200 with a status envelope: unknown ids, missing
/// credentials, and failed executions all render as `status: "error"`.
#[utoipa::path(
    post,
    path = "/approve-action",
    request_body = ApproveActionRequest,
    responses((status = 200, description = "Approval outcome", body = ApproveActionResponse)),
    tag = "agent"
)]
pub async fn approve_action(
    State(state): State<AppState>,
    Json(req): Json<ApproveActionRequest>,
) -> Json<ApproveActionResponse> {
    match state.brain.approve(req.action_id).await {
        Ok(outcome) if outcome.executed() => Json(ApproveActionResponse {
            status: "success".to_string(),
            message: "Action executed successfully".to_string(),
            data: outcome.result,
        }),
        Ok(outcome) => Json(ApproveActionResponse {
            status: "error".to_string(),
            message: "Execution failed".to_string(),
            data: outcome.result,
        }),
        Err(err) => Json(ApproveActionResponse {
            status: "error".to_string(),
            message: err.to_string(),
            data: None,
        }),
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExecuteActionRequest {
    pub user_id: i64,
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ExecuteActionResponse {
    pub status: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Direct execution, bypassing the pending/approval flow entirely.
///
/// Unlike approval, which silently rejects unsupported pairs, this path
/// answers 400 with an explicit message. The provider is taken literally
/// (no alias mapping), so "gmail" here fails the credential lookup.
#[utoipa::path(
    post,
    path = "/execute-action",
    request_body = ExecuteActionRequest,
    responses(
        (status = 200, description = "Execution result", body = ExecuteActionResponse),
        (status = 400, description = "Missing credential or unsupported provider/tool", body = ApiError),
        (status = 500, description = "Executor or database failure", body = ApiError)
    ),
    tag = "agent"
)]
pub async fn execute_action(
    State(state): State<AppState>,
    Json(req): Json<ExecuteActionRequest>,
) -> Result<Json<ExecuteActionResponse>, AppError> {
    let token = state
        .store
        .user_token(req.user_id, &req.provider)
        .await?
        .ok_or(AppError::MissingCredential {
            provider: req.provider.clone(),
        })?;

    let executor =
        state
            .executors
            .get(&req.provider, &req.tool)
            .ok_or(AppError::UnsupportedAction {
                provider: req.provider.clone(),
                tool: req.tool.clone(),
            })?;

    let data = executor
        .execute(&token.access_token, &req.parameters)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(ExecuteActionResponse {
        status: "success".to_string(),
        data,
    }))
}

fn agent_error_to_app(err: AgentError) -> AppError {
    match err {
        AgentError::NotFound => AppError::NotFound {
            resource: "action".to_string(),
        },
        AgentError::MissingCredential { provider } => AppError::MissingCredential { provider },
        AgentError::Store(err) => err.into(),
        AgentError::Llm(err) => AppError::Internal(err.to_string()),
    }
}
