//! Application state: store, providers and the orchestrator built from settings

use std::sync::Arc;

use tracing::{info, warn};

use crate::build::image::ImageBuilder;
use crate::build::package::ZipPackager;
use crate::build::runner::{CommandRunner, ScriptedRunner};
use crate::deploy::{ArtifactBuilder, DeploymentOrchestrator, PipelineDeps};
use crate::errors::ServerError;
use crate::function::memory::MemoryFunctions;
use crate::function::publisher::FunctionPublisher;
use crate::function::retry::{tokio_sleep, RetryPolicy};
use crate::function::FunctionProvider;
use crate::registry::memory::MemoryRegistry;
use crate::registry::{ContainerRegistry, RegistryManager};
use crate::storage::memory::MemoryStore;
use crate::storage::postgres::PostgresStore;
use crate::storage::settings::{CloudProviderKind, CloudSettings, PackageType, Settings};
use crate::storage::DeploymentStore;

/// Cloud-facing collaborators
pub struct Providers {
    pub registry: Arc<dyn ContainerRegistry>,
    pub functions: Arc<dyn FunctionProvider>,
    pub runner: Arc<dyn CommandRunner>,
}

impl Providers {
    /// In-process providers. Build commands are recorded, not executed.
    pub fn in_memory() -> Self {
        Self {
            registry: Arc::new(MemoryRegistry::new()),
            functions: Arc::new(MemoryFunctions::new()),
            runner: Arc::new(ScriptedRunner::new()),
        }
    }
}

/// Application state
pub struct AppState {
    pub store: Arc<dyn DeploymentStore>,
    pub functions: Arc<dyn FunctionProvider>,
    pub orchestrator: Arc<DeploymentOrchestrator>,
}

impl AppState {
    pub async fn init(settings: &Settings) -> Result<Self, ServerError> {
        let store = init_store(settings).await?;
        let providers = init_providers(&settings.cloud).await?;
        Ok(Self::with_parts(settings, store, providers))
    }

    /// Assemble the state from already built parts
    pub fn with_parts(
        settings: &Settings,
        store: Arc<dyn DeploymentStore>,
        providers: Providers,
    ) -> Self {
        let build = &settings.build;
        let artifacts = match build.package_type {
            PackageType::Image => ArtifactBuilder::Image(ImageBuilder::new(
                providers.runner.clone(),
                &build.tool,
                &build.sdk_requirement,
            )),
            PackageType::Zip => ArtifactBuilder::Zip(ZipPackager::new(
                providers.runner.clone(),
                &build.pip,
                &build.pip_platform,
                &build.sdk_requirement,
            )),
        };

        let publisher = FunctionPublisher::new(
            providers.functions.clone(),
            settings.cloud.lambda_role_arn.clone(),
            RetryPolicy::new(settings.publish.initial_backoff(), settings.publish.max_retries),
            tokio_sleep(),
        );

        let deps = PipelineDeps {
            artifacts,
            registry: RegistryManager::new(
                providers.registry.clone(),
                settings.cloud.function_arn_prefix(),
            ),
            publisher,
            store: store.clone(),
            registry_domain: settings.cloud.registry_domain(),
            timeout: settings.orchestrator.pipeline_timeout(),
        };
        let orchestrator = DeploymentOrchestrator::new(
            deps,
            &settings.orchestrator,
            settings.build.work_dir.clone(),
        );

        Self {
            store,
            functions: providers.functions,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

async fn init_store(settings: &Settings) -> Result<Arc<dyn DeploymentStore>, ServerError> {
    if let Some(url) = &settings.database.url {
        let store = PostgresStore::connect(url, settings.database.max_connections)
            .await
            .map_err(|e| ServerError::Startup(e.to_string()))?;
        return Ok(Arc::new(store));
    }

    warn!("No database configured, using the in-memory store");
    let store = MemoryStore::new();
    if let Some(api_key) = &settings.auth.dev_api_key {
        store
            .create_user("dev", api_key)
            .map_err(|e| ServerError::Startup(e.to_string()))?;
        info!("Seeded user 'dev' into the in-memory store");
    }
    Ok(Arc::new(store))
}

async fn init_providers(cloud: &CloudSettings) -> Result<Providers, ServerError> {
    match cloud.provider {
        CloudProviderKind::Memory => {
            warn!("Using in-memory cloud providers, builds are not executed");
            Ok(Providers::in_memory())
        }
        CloudProviderKind::Aws => init_aws_providers(cloud).await,
    }
}

#[cfg(feature = "aws")]
async fn init_aws_providers(cloud: &CloudSettings) -> Result<Providers, ServerError> {
    use crate::build::runner::ProcessRunner;
    use crate::function::aws::LambdaFunctions;
    use crate::registry::aws::EcrRegistry;

    if cloud.lambda_role_arn.is_empty() {
        return Err(ServerError::Startup(
            "LAMBDA_ROLE_ARN is required for the aws provider".to_string(),
        ));
    }
    let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(cloud.region.clone()))
        .load()
        .await;
    info!(region = %cloud.region, account_id = %cloud.account_id, "Using AWS providers");

    Ok(Providers {
        registry: Arc::new(EcrRegistry::new(&config)),
        functions: Arc::new(LambdaFunctions::new(&config)),
        runner: Arc::new(ProcessRunner),
    })
}

#[cfg(not(feature = "aws"))]
async fn init_aws_providers(_cloud: &CloudSettings) -> Result<Providers, ServerError> {
    Err(ServerError::Startup(
        "cloud.provider is 'aws' but the server was built without the `aws` feature".to_string(),
    ))
}
