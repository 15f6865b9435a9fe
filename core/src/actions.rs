use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Provider aliases the model is known to emit, mapped to the canonical
/// vocabulary the store and executors expect. Extend here when a new alias
/// shows up in the wild.
const PROVIDER_ALIASES: &[(&str, &str)] = &[("gmail", "google"), ("asana_api", "asana")];

/// Tool name → persisted action_type. Tools without an entry pass through
/// as their own action_type.
const TOOL_ACTION_TYPES: &[(&str, &str)] = &[
    ("create_asana_task", "create_task"),
    ("send_gmail", "send_email"),
];

/// Rewrite a model-supplied provider into canonical form. Idempotent:
/// canonical values (and unknown ones) pass through unchanged.
pub fn canonical_provider(raw: &str) -> &str {
    PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}

/// Derive the persisted action_type from a tool name.
pub fn canonical_action_type(tool: &str) -> &str {
    TOOL_ACTION_TYPES
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, action_type)| *action_type)
        .unwrap_or(tool)
}

/// Lifecycle of a persisted action proposal. Rows are never deleted;
/// the approval flow is the only writer after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Executed,
    Rejected,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Executed => "executed",
            ActionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown action status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for ActionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "executed" => Ok(ActionStatus::Executed),
            "rejected" => Ok(ActionStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted, not-yet-executed proposal to perform a side-effecting
/// third-party operation. `provider` is always canonical; the mapper runs
/// before any row is written.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PendingAction {
    pub id: i64,
    pub user_id: i64,
    /// Canonical provider ("google", "asana")
    pub provider: String,
    /// Canonical action type ("send_email", "create_task", or the raw tool name)
    pub action_type: String,
    /// The proposed action as drafted: original tool name plus parameters
    #[schema(value_type = Object)]
    pub draft_payload: Value,
    pub status: ActionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

/// A single action as proposed by the model within one turn. Transient;
/// persisted actions get their row id attached before being returned in
/// the plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: Map<String, Value>,
}

impl ActionDraft {
    /// Defensively decode one raw action from the model's output. The model's
    /// JSON is untrusted: anything that isn't an object is refused, and
    /// missing or ill-typed fields fall back to empty defaults.
    pub fn from_raw(raw: &Value) -> Option<ActionDraft> {
        if !raw.is_object() {
            return None;
        }
        serde_json::from_value(raw.clone()).ok()
    }

    /// Rewrite the provider alias to canonical form. The tool name is kept
    /// verbatim; action_type derivation happens at persistence time.
    pub fn canonicalize(mut self) -> ActionDraft {
        self.provider = canonical_provider(&self.provider).to_string();
        self
    }

    /// The action_type this draft persists under.
    pub fn action_type(&self) -> &str {
        canonical_action_type(&self.tool)
    }
}
