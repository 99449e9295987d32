//! Container registry management
//!
//! Every service gets its own repository, named `{user}_{service}`, with a
//! pull policy limited to that service's functions.

pub mod memory;
pub mod policy;

#[cfg(feature = "aws")]
pub mod aws;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::errors::ProviderError;
use crate::registry::policy::RepositoryPolicy;

#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Create a repository. Fails with [`ProviderError::AlreadyExists`]
    /// when it is already there.
    async fn create_repository(&self, repository: &str) -> Result<(), ProviderError>;

    /// Replace the repository's access policy
    async fn set_repository_policy(
        &self,
        repository: &str,
        policy: &RepositoryPolicy,
    ) -> Result<(), ProviderError>;
}

pub struct RegistryManager {
    registry: Arc<dyn ContainerRegistry>,
    function_arn_prefix: String,
}

impl RegistryManager {
    pub fn new(registry: Arc<dyn ContainerRegistry>, function_arn_prefix: impl Into<String>) -> Self {
        Self {
            registry,
            function_arn_prefix: function_arn_prefix.into(),
        }
    }

    /// Make sure `repository` exists and carries the scoped pull policy.
    ///
    /// An existing repository counts as success. The policy is written on
    /// every call so a stale or hand-edited policy gets corrected.
    pub async fn ensure_repository(&self, repository: &str) -> Result<RepositoryPolicy, ProviderError> {
        match self.registry.create_repository(repository).await {
            Ok(()) => info!(repository, "created repository"),
            Err(ProviderError::AlreadyExists(_)) => debug!(repository, "repository already exists"),
            Err(e) => {
                error!(repository, code = e.code(), error = %e, "failed to create repository");
                return Err(e);
            }
        }

        let policy = RepositoryPolicy::for_repository(&self.function_arn_prefix, repository);
        self.registry
            .set_repository_policy(repository, &policy)
            .await
            .inspect_err(|e| {
                error!(repository, code = e.code(), error = %e, "failed to set repository policy");
            })?;
        debug!(repository, "repository policy set");
        Ok(policy)
    }
}
