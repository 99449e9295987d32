use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSchema {
    pub git_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A deployed service as returned by the services API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSchema {
    pub name: String,
    pub deployment: DeploymentSchema,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedService {
    pub name: String,
    pub git_hash: String,
}
