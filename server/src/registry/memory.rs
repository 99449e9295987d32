//! In-memory registry with fault injection

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::registry::policy::RepositoryPolicy;
use crate::registry::ContainerRegistry;

#[derive(Debug, Default, Clone)]
struct Repository {
    policy: Option<RepositoryPolicy>,
    policy_writes: u32,
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    repositories: RwLock<HashMap<String, Repository>>,
    create_failures: RwLock<HashMap<String, ProviderError>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_repository` fail for this repository
    pub fn fail_create(&self, repository: &str, error: ProviderError) {
        if let Ok(mut failures) = self.create_failures.write() {
            failures.insert(repository.to_string(), error);
        }
    }

    pub fn policy(&self, repository: &str) -> Option<RepositoryPolicy> {
        let repositories = self.repositories.read().ok()?;
        repositories.get(repository).and_then(|r| r.policy.clone())
    }

    pub fn policy_writes(&self, repository: &str) -> u32 {
        self.repositories
            .read()
            .ok()
            .and_then(|r| r.get(repository).map(|r| r.policy_writes))
            .unwrap_or(0)
    }

    pub fn repositories(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .repositories
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn poisoned() -> ProviderError {
    ProviderError::other("Internal", "lock poisoned")
}

#[async_trait]
impl ContainerRegistry for MemoryRegistry {
    async fn create_repository(&self, repository: &str) -> Result<(), ProviderError> {
        if let Some(err) = self
            .create_failures
            .read()
            .map_err(|_| poisoned())?
            .get(repository)
        {
            return Err(err.clone());
        }

        let mut repositories = self.repositories.write().map_err(|_| poisoned())?;
        if repositories.contains_key(repository) {
            return Err(ProviderError::AlreadyExists(repository.to_string()));
        }
        repositories.insert(repository.to_string(), Repository::default());
        Ok(())
    }

    async fn set_repository_policy(
        &self,
        repository: &str,
        policy: &RepositoryPolicy,
    ) -> Result<(), ProviderError> {
        let mut repositories = self.repositories.write().map_err(|_| poisoned())?;
        let repo = repositories
            .get_mut(repository)
            .ok_or_else(|| ProviderError::NotFound(repository.to_string()))?;
        repo.policy = Some(policy.clone());
        repo.policy_writes += 1;
        Ok(())
    }
}
