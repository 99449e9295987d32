//! Deployment and service models

use api_models::{DeploymentSchema, ServiceSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned batch of services, unique per `(user_id, git_hash)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deployment {
    pub id: i64,
    pub user_id: i64,
    pub git_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A function that was published under a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub deployment_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A service joined with its deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub service: Service,
    pub deployment: Deployment,
}

impl ServiceRecord {
    pub fn to_schema(&self) -> ServiceSchema {
        ServiceSchema {
            name: self.service.name.clone(),
            deployment: DeploymentSchema {
                git_hash: self.deployment.git_hash.clone(),
                created_at: self.deployment.created_at,
            },
            created_at: self.service.created_at,
        }
    }
}
