//! Amazon ECR registry

use async_trait::async_trait;
use aws_sdk_ecr::error::ProvideErrorMetadata;
use aws_sdk_ecr::Client;

use crate::errors::ProviderError;
use crate::registry::policy::RepositoryPolicy;
use crate::registry::ContainerRegistry;

pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn provider_error<E: ProvideErrorMetadata>(err: &E) -> ProviderError {
    ProviderError::from_code(err.code(), err.message())
}

#[async_trait]
impl ContainerRegistry for EcrRegistry {
    async fn create_repository(&self, repository: &str) -> Result<(), ProviderError> {
        self.client
            .create_repository()
            .repository_name(repository)
            .send()
            .await
            .map_err(|e| provider_error(&e))?;
        Ok(())
    }

    async fn set_repository_policy(
        &self,
        repository: &str,
        policy: &RepositoryPolicy,
    ) -> Result<(), ProviderError> {
        let policy_text = policy
            .to_json()
            .map_err(|e| ProviderError::other("InvalidPolicy", e.to_string()))?;
        self.client
            .set_repository_policy()
            .repository_name(repository)
            .policy_text(policy_text)
            .send()
            .await
            .map_err(|e| provider_error(&e))?;
        Ok(())
    }
}
