//! Persistence seam. The orchestrator and routes only see the `Store` trait;
//! `PgStore` is the Postgres implementation, tests substitute an in-memory
//! double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use attache_core::actions::{ActionStatus, PendingAction};
use attache_core::tokens::UserToken;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// Non-sqlx backends (test doubles) report failures here.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Most recently updated credential for (user, provider), if any.
    async fn user_token(
        &self,
        user_id: i64,
        provider: &str,
    ) -> Result<Option<UserToken>, StoreError>;

    /// Insert a draft with status 'pending' and return its id.
    async fn create_pending_action(
        &self,
        user_id: i64,
        provider: &str,
        action_type: &str,
        draft_payload: &serde_json::Value,
    ) -> Result<i64, StoreError>;

    /// All of a user's pending actions, most recent first.
    async fn pending_actions(&self, user_id: i64) -> Result<Vec<PendingAction>, StoreError>;

    /// Direct keyed lookup, restricted to status 'pending'. Ids that were
    /// already executed or rejected read as absent.
    async fn pending_action(&self, action_id: i64) -> Result<Option<PendingAction>, StoreError>;

    async fn update_action_status(
        &self,
        action_id: i64,
        status: ActionStatus,
    ) -> Result<(), StoreError>;

    /// Append-only chat audit trail. Never read back.
    async fn log_chat(&self, user_id: i64, role: &str, content: &str) -> Result<(), StoreError>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> bool;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct PendingActionRow {
    id: i64,
    user_id: i64,
    provider: String,
    action_type: String,
    draft_payload: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
}

impl PendingActionRow {
    fn into_action(self) -> Result<PendingAction, StoreError> {
        let status = self
            .status
            .parse::<ActionStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(PendingAction {
            id: self.id,
            user_id: self.user_id,
            provider: self.provider,
            action_type: self.action_type,
            draft_payload: self.draft_payload,
            status,
            created_at: self.created_at,
            executed_at: self.executed_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user_token(
        &self,
        user_id: i64,
        provider: &str,
    ) -> Result<Option<UserToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT access_token, refresh_token, expires_at
            FROM user_connections
            WHERE user_id = $1 AND provider = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserToken {
            user_id,
            provider: provider.to_string(),
            access_token: r.access_token,
            refresh_token: r.refresh_token,
            expires_at: r.expires_at,
        }))
    }

    async fn create_pending_action(
        &self,
        user_id: i64,
        provider: &str,
        action_type: &str,
        draft_payload: &serde_json::Value,
    ) -> Result<i64, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ai_pending_actions (user_id, provider, action_type, draft_payload, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(action_type)
        .bind(draft_payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn pending_actions(&self, user_id: i64) -> Result<Vec<PendingAction>, StoreError> {
        let rows = sqlx::query_as::<_, PendingActionRow>(
            r#"
            SELECT id, user_id, provider, action_type, draft_payload, status,
                   created_at, executed_at
            FROM ai_pending_actions
            WHERE user_id = $1 AND status = 'pending'
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingActionRow::into_action).collect()
    }

    async fn pending_action(&self, action_id: i64) -> Result<Option<PendingAction>, StoreError> {
        let row = sqlx::query_as::<_, PendingActionRow>(
            r#"
            SELECT id, user_id, provider, action_type, draft_payload, status,
                   created_at, executed_at
            FROM ai_pending_actions
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(action_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingActionRow::into_action).transpose()
    }

    async fn update_action_status(
        &self,
        action_id: i64,
        status: ActionStatus,
    ) -> Result<(), StoreError> {
        // Only an execution stamps executed_at; a rejection leaves it NULL.
        let query = if status == ActionStatus::Executed {
            "UPDATE ai_pending_actions SET status = $2, executed_at = NOW() WHERE id = $1"
        } else {
            "UPDATE ai_pending_actions SET status = $2 WHERE id = $1"
        };
        sqlx::query(query)
            .bind(action_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn log_chat(&self, user_id: i64, role: &str, content: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO agent_chat_logs (user_id, role, content) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(role)
            .bind(content)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
