use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored third-party credential for one (user, provider) pair. Read-only
/// from this service's perspective; connecting and refreshing providers
/// happens elsewhere. When multiple rows exist, the most recently updated
/// one wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserToken {
    pub user_id: i64,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
