//! Persistence of users, deployments and services

pub mod memory;
pub mod postgres;
pub mod settings;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{Deployment, Service, ServiceRecord, User};

/// Which deployment of a service a request refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentSelector {
    /// The most recently created deployment containing the service
    Latest,
    GitHash(String),
}

impl DeploymentSelector {
    /// Parse the atomic deployment header value (`latest` or a git hash)
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("latest") {
            DeploymentSelector::Latest
        } else {
            DeploymentSelector::GitHash(
                value
                    .chars()
                    .take(api_models::GIT_HASH_LEN)
                    .map(|c| c.to_ascii_lowercase())
                    .collect(),
            )
        }
    }
}

/// Storage used by the orchestrator and the services API.
///
/// Every method is its own short transaction, so concurrent pipelines of
/// one request never share a session.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError>;

    /// Number of distinct deployments owned by the user
    async fn count_deployments(&self, user_id: i64) -> Result<u64, StoreError>;

    async fn find_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Option<Deployment>, StoreError>;

    /// Return the deployment for `(user_id, git_hash)`, creating it if absent
    async fn get_or_create_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Deployment, StoreError>;

    /// Insert the service, or return the existing row for `(deployment_id, name)`
    async fn upsert_service(&self, deployment_id: i64, name: &str) -> Result<Service, StoreError>;

    /// All services of the user, newest deployment first
    async fn list_services(&self, user_id: i64) -> Result<Vec<ServiceRecord>, StoreError>;

    async fn find_service(
        &self,
        user_id: i64,
        name: &str,
        selector: &DeploymentSelector,
    ) -> Result<Option<ServiceRecord>, StoreError>;

    async fn delete_service(&self, service_id: i64) -> Result<(), StoreError>;
}
