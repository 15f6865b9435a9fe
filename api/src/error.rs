use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use attache_core::error::{self, ApiError};

use crate::store::StoreError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Referenced resource does not exist (404)
    NotFound { resource: String },
    /// No stored credential for the provider the action needs (400)
    MissingCredential { provider: String },
    /// No executor is registered for the (provider, tool) pair (400)
    UnsupportedAction { provider: String, tool: String },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::MissingCredential { provider } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::MISSING_CREDENTIAL.to_string(),
                    message: format!("No {provider} token found"),
                    field: Some("provider".to_string()),
                    received: Some(serde_json::Value::String(provider)),
                    request_id,
                    docs_hint: Some(
                        "Connect the provider for this user before executing actions against it."
                            .to_string(),
                    ),
                },
            ),
            AppError::UnsupportedAction { provider, tool } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::UNSUPPORTED_ACTION.to_string(),
                    message: "Unsupported action or provider".to_string(),
                    field: Some("tool".to_string()),
                    received: Some(serde_json::json!({
                        "provider": provider,
                        "tool": tool,
                    })),
                    request_id,
                    docs_hint: Some(
                        "Supported combinations: (asana, create_asana_task), (google, send_gmail)."
                            .to_string(),
                    ),
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: err.to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: msg,
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(err) => AppError::Database(err),
            StoreError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}
