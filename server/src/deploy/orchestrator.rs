//! Multi-service deployment orchestration
//!
//! Every declared service runs its own pipeline on its own task, at most
//! `max_concurrent_pipelines` at a time. A failing pipeline never cancels
//! its siblings. Results are re-paired with their service by index, so the
//! report follows the request order whatever the completion order.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use api_models::{validate, DeployConfig, DeployResult};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::deploy::naming;
use crate::deploy::pipeline::{DeployedService, PipelineDeps, PipelineJob, ServicePipeline};
use crate::errors::{DeployError, PipelineError};
use crate::filesys::dir::Dir;
use crate::models::User;
use crate::packaging::extract_bundle;
use crate::storage::settings::OrchestratorSettings;
use crate::storage::DeploymentStore;

const BUNDLE_DIR: &str = "bundle";
const SERVICES_DIR: &str = "services";

pub struct DeploymentOrchestrator {
    deps: Arc<PipelineDeps>,
    max_concurrent_pipelines: usize,
    max_deployments_per_user: u32,
    /// Parent of per-request scratch directories
    work_dir: Option<PathBuf>,
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "pipeline panicked".to_string()
    }
}

impl DeploymentOrchestrator {
    pub fn new(deps: PipelineDeps, settings: &OrchestratorSettings, work_dir: Option<PathBuf>) -> Self {
        Self {
            deps: Arc::new(deps),
            max_concurrent_pipelines: settings.max_concurrent_pipelines.max(1),
            max_deployments_per_user: settings.max_deployments_per_user,
            work_dir,
        }
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.deps.store
    }

    /// Validate the request, unpack the bundle and deploy every service.
    ///
    /// Request-level problems abort before any pipeline starts. Per-service
    /// failures are reported in the returned [`DeployResult`].
    pub async fn deploy(
        &self,
        user: &User,
        config: DeployConfig,
        bundle: Vec<u8>,
    ) -> Result<DeployResult, DeployError> {
        let config = config.validated()?;
        if user.is_blocked {
            return Err(DeployError::Blocked(user.username.clone()));
        }
        validate::username(&user.username)?;
        for service in &config.services {
            naming::check_function_name(&naming::function_name(
                &user.username,
                &service.name,
                &config.git_hash,
            ))?;
        }
        self.check_quota(user, &config.git_hash).await?;

        let scratch = match &self.work_dir {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await?;
                tempfile::Builder::new().prefix("pare-deploy-").tempdir_in(parent)?
            }
            None => tempfile::Builder::new().prefix("pare-deploy-").tempdir()?,
        };
        let scratch_dir = Dir::new(scratch.path());
        let bundle_dir = scratch_dir.subdir(BUNDLE_DIR);
        extract_bundle(bundle, bundle_dir.path()).await?;

        let result = self
            .deploy_bundle(user, &config, &bundle_dir, &scratch_dir)
            .await;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }
        Ok(result)
    }

    async fn check_quota(&self, user: &User, git_hash: &str) -> Result<(), DeployError> {
        let store = &self.deps.store;
        if store.find_deployment(user.id, git_hash).await?.is_some() {
            return Ok(());
        }
        let count = store.count_deployments(user.id).await?;
        if count >= u64::from(self.max_deployments_per_user) {
            warn!(user = %user.username, count, "deployment quota exceeded");
            return Err(DeployError::QuotaExceeded {
                limit: self.max_deployments_per_user,
            });
        }
        Ok(())
    }

    /// Run one pipeline per service over an already unpacked bundle
    pub async fn deploy_bundle(
        &self,
        user: &User,
        config: &DeployConfig,
        bundle: &Dir,
        scratch: &Dir,
    ) -> DeployResult {
        info!(
            user = %user.username,
            git_hash = %config.git_hash,
            services = config.services.len(),
            "starting deployment"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_pipelines));
        let mut tasks = JoinSet::new();
        for (index, service) in config.services.iter().enumerate() {
            let job = PipelineJob {
                user_id: user.id,
                username: user.username.clone(),
                git_hash: config.git_hash.clone(),
                python_version: config.python_version.clone(),
                environment: config.environment_variables.clone(),
                service: service.clone(),
                bundle: bundle.clone(),
                // names are unique ignoring case, so directories never collide
                work_dir: scratch
                    .subdir(SERVICES_DIR)
                    .subdir(&service.name.to_ascii_lowercase()),
            };
            let pipeline = ServicePipeline::new(self.deps.clone());
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => AssertUnwindSafe(pipeline.run(&job))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(PipelineError::Aborted(panic_message(panic)))),
                    Err(e) => Err(PipelineError::Aborted(e.to_string())),
                };
                (index, result)
            });
        }

        let mut outcomes: Vec<Option<Result<DeployedService, PipelineError>>> =
            (0..config.services.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => outcomes[index] = Some(result),
                Err(e) => error!(error = %e, "pipeline task did not complete"),
            }
        }

        let mut result = DeployResult::default();
        for (service, outcome) in config.services.iter().zip(outcomes) {
            match outcome {
                Some(Ok(_)) => result.succeeded.push(service.name.clone()),
                Some(Err(_)) => result.failed.push(service.name.clone()),
                None => {
                    error!(service = %service.name, "no result for pipeline");
                    result.failed.push(service.name.clone());
                }
            }
        }

        if result.is_success() {
            info!(
                user = %user.username,
                git_hash = %config.git_hash,
                succeeded = result.succeeded.len(),
                "deployment complete"
            );
        } else {
            warn!(
                user = %user.username,
                git_hash = %config.git_hash,
                succeeded = ?result.succeeded,
                failed = ?result.failed,
                "deployment partially failed"
            );
        }
        result
    }
}
