//! In-memory deployment store for tests and dry runs

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use api_models::validate;

use crate::errors::StoreError;
use crate::models::{Deployment, Service, ServiceRecord, User};
use crate::storage::{DeploymentSelector, DeploymentStore};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    deployments: Vec<Deployment>,
    services: Vec<Service>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn deployment(&self, id: i64) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.id == id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Service names whose row writes fail
    failing_services: RwLock<HashSet<String>>,
}

fn poisoned() -> StoreError {
    StoreError::internal("store lock poisoned")
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&self, username: &str, api_key: &str) -> Result<User, StoreError> {
        validate::username(username).map_err(|e| StoreError::internal(e.to_string()))?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.users.iter().any(|u| u.username == username || u.api_key == api_key) {
            return Err(StoreError::internal(format!(
                "user '{}' or its api key already exists",
                username
            )));
        }
        let user = User {
            id: tables.next_id(),
            username: username.to_string(),
            api_key: api_key.to_string(),
            is_blocked: false,
            created_at: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    pub fn block(&self, user_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::internal(format!("unknown user {}", user_id)))?;
        user.is_blocked = true;
        Ok(())
    }

    /// Make every write of a service row named `name` fail
    pub fn fail_service_writes(&self, name: &str) {
        if let Ok(mut failing) = self.failing_services.write() {
            failing.insert(name.to_string());
        }
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.tables
            .read()
            .map(|t| t.deployments.clone())
            .unwrap_or_default()
    }

    pub fn services(&self) -> Vec<Service> {
        self.tables
            .read()
            .map(|t| t.services.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables.users.iter().find(|u| u.api_key == api_key).cloned())
    }

    async fn count_deployments(&self, user_id: i64) -> Result<u64, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .deployments
            .iter()
            .filter(|d| d.user_id == user_id)
            .count() as u64)
    }

    async fn find_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Option<Deployment>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(tables
            .deployments
            .iter()
            .find(|d| d.user_id == user_id && d.git_hash == git_hash)
            .cloned())
    }

    async fn get_or_create_deployment(
        &self,
        user_id: i64,
        git_hash: &str,
    ) -> Result<Deployment, StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if let Some(existing) = tables
            .deployments
            .iter()
            .find(|d| d.user_id == user_id && d.git_hash == git_hash)
        {
            return Ok(existing.clone());
        }
        let deployment = Deployment {
            id: tables.next_id(),
            user_id,
            git_hash: git_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.deployments.push(deployment.clone());
        Ok(deployment)
    }

    async fn upsert_service(&self, deployment_id: i64, name: &str) -> Result<Service, StoreError> {
        if self
            .failing_services
            .read()
            .map_err(|_| poisoned())?
            .contains(name)
        {
            return Err(StoreError::internal(format!(
                "injected write failure for service '{}'",
                name
            )));
        }

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if tables.deployment(deployment_id).is_none() {
            return Err(StoreError::internal(format!(
                "unknown deployment {}",
                deployment_id
            )));
        }
        if let Some(existing) = tables
            .services
            .iter()
            .find(|s| s.deployment_id == deployment_id && s.name == name)
        {
            return Ok(existing.clone());
        }
        let service = Service {
            id: tables.next_id(),
            deployment_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        tables.services.push(service.clone());
        Ok(service)
    }

    async fn list_services(&self, user_id: i64) -> Result<Vec<ServiceRecord>, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let mut records: Vec<ServiceRecord> = tables
            .services
            .iter()
            .filter_map(|service| {
                let deployment = tables.deployment(service.deployment_id)?;
                (deployment.user_id == user_id).then(|| ServiceRecord {
                    service: service.clone(),
                    deployment: deployment.clone(),
                })
            })
            .collect();
        records.sort_by(|a, b| {
            b.deployment
                .id
                .cmp(&a.deployment.id)
                .then_with(|| a.service.name.cmp(&b.service.name))
        });
        Ok(records)
    }

    async fn find_service(
        &self,
        user_id: i64,
        name: &str,
        selector: &DeploymentSelector,
    ) -> Result<Option<ServiceRecord>, StoreError> {
        let records = self.list_services(user_id).await?;
        Ok(records.into_iter().find(|r| {
            r.service.name == name
                && match selector {
                    DeploymentSelector::Latest => true,
                    DeploymentSelector::GitHash(hash) => &r.deployment.git_hash == hash,
                }
        }))
    }

    async fn delete_service(&self, service_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.services.retain(|s| s.id != service_id);
        Ok(())
    }
}
