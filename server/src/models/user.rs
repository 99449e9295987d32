//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner of deployments, resolved from the API key header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Namespace for repositories and functions. `[a-z0-9-]` only.
    pub username: String,

    #[serde(skip_serializing)]
    pub api_key: String,

    /// Blocked users cannot deploy or manage services
    pub is_blocked: bool,

    pub created_at: DateTime<Utc>,
}
