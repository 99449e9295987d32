//! One service's pipeline: repository, build, publish, record
//!
//! The provider-facing stages run under a timeout. Recording runs outside
//! it, since by then the function is already live.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use api_models::ServiceConfig;
use tracing::{debug, error, info, warn, Instrument};

use crate::build::adapter::ADAPTER_HANDLER;
use crate::build::image::{ImageBuildRequest, ImageBuilder};
use crate::build::package::ZipPackager;
use crate::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};
use crate::deploy::naming;
use crate::errors::PipelineError;
use crate::filesys::dir::Dir;
use crate::function::publisher::{FunctionPublisher, PublishAction};
use crate::function::runtime::runtime_for;
use crate::function::FunctionCode;
use crate::registry::RegistryManager;
use crate::storage::DeploymentStore;

/// How function code is produced
pub enum ArtifactBuilder {
    Image(ImageBuilder),
    Zip(ZipPackager),
}

/// Collaborators shared by every pipeline of an orchestrator
pub struct PipelineDeps {
    pub artifacts: ArtifactBuilder,
    pub registry: RegistryManager,
    pub publisher: FunctionPublisher,
    pub store: Arc<dyn DeploymentStore>,
    /// `{account}.{registry-host}`
    pub registry_domain: String,
    pub timeout: Duration,
}

/// Everything one pipeline needs, owned so it can run on its own task
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub user_id: i64,
    pub username: String,
    pub git_hash: String,
    pub python_version: String,
    pub environment: BTreeMap<String, String>,
    pub service: ServiceConfig,
    /// Unpacked bundle, shared read-only by all pipelines of the request
    pub bundle: Dir,
    /// Scratch directory owned by this pipeline
    pub work_dir: Dir,
}

impl PipelineJob {
    pub fn function_name(&self) -> String {
        naming::function_name(&self.username, &self.service.name, &self.git_hash)
    }

    pub fn repository_name(&self) -> String {
        naming::repository_name(&self.username, &self.service.name)
    }
}

/// A service that was published and recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedService {
    pub name: String,
    pub function_name: String,
    pub image: Option<String>,
    pub action: PublishAction,
    pub deployment_id: i64,
}

fn advance(fsm: &mut PipelineFsm, event: PipelineEvent) -> Result<(), PipelineError> {
    fsm.process(event).map_err(PipelineError::Aborted)
}

pub struct ServicePipeline {
    deps: Arc<PipelineDeps>,
}

impl ServicePipeline {
    pub fn new(deps: Arc<PipelineDeps>) -> Self {
        Self { deps }
    }

    pub async fn run(&self, job: &PipelineJob) -> Result<DeployedService, PipelineError> {
        let span = tracing::info_span!(
            "pipeline",
            user = %job.username,
            git_hash = %job.git_hash,
            service = %job.service.name,
        );
        self.run_stages(job).instrument(span).await
    }

    async fn run_stages(&self, job: &PipelineJob) -> Result<DeployedService, PipelineError> {
        let mut fsm = PipelineFsm::new();
        let function_name = job.function_name();

        let published = tokio::time::timeout(self.deps.timeout, self.publish(job, &mut fsm)).await;
        let (image, action) = match published {
            Ok(Ok(published)) => published,
            Ok(Err(e)) => return Err(self.fail(&mut fsm, e)),
            Err(_) => {
                let e = PipelineError::TimedOut(self.deps.timeout);
                return Err(self.fail(&mut fsm, e));
            }
        };

        let deployment_id = match self.record(job).await {
            Ok(deployment_id) => deployment_id,
            Err(e) => {
                error!(
                    reconciliation = true,
                    stage = PipelineState::Recording.as_str(),
                    function = %function_name,
                    error = %e,
                    "function is live but its service row was not written"
                );
                return Err(self.fail(&mut fsm, e));
            }
        };
        advance(&mut fsm, PipelineEvent::Recorded)?;
        info!(
            stage = fsm.state().as_str(),
            function = %function_name,
            image = image.as_deref().unwrap_or("-"),
            "service deployed"
        );

        Ok(DeployedService {
            name: job.service.name.clone(),
            function_name,
            image,
            action,
            deployment_id,
        })
    }

    fn fail(&self, fsm: &mut PipelineFsm, error: PipelineError) -> PipelineError {
        let stage = fsm.state();
        if let Err(e) = fsm.process(PipelineEvent::Fail(error.to_string())) {
            debug!(error = %e, "pipeline already terminal");
        }
        warn!(stage = stage.as_str(), error = %error, "pipeline failed");
        error
    }

    /// Build the artifact and publish the function. Returns the pushed image, if any.
    async fn publish(
        &self,
        job: &PipelineJob,
        fsm: &mut PipelineFsm,
    ) -> Result<(Option<String>, PublishAction), PipelineError> {
        let (code, image) = match &self.deps.artifacts {
            ArtifactBuilder::Image(builder) => {
                advance(fsm, PipelineEvent::Start)?;
                let repository = job.repository_name();
                self.deps
                    .registry
                    .ensure_repository(&repository)
                    .await
                    .map_err(PipelineError::Registry)?;
                advance(fsm, PipelineEvent::RepositoryReady)?;

                let image_name = naming::image_name(
                    &self.deps.registry_domain,
                    &repository,
                    &naming::image_tag(&job.git_hash, &job.python_version),
                );
                debug!(stage = fsm.state().as_str(), image = %image_name, "building image");
                let built = builder
                    .build(&ImageBuildRequest {
                        bundle: &job.bundle,
                        work_dir: &job.work_dir,
                        service: &job.service,
                        python_version: &job.python_version,
                        image_name: &image_name,
                    })
                    .await?;
                advance(fsm, PipelineEvent::Built)?;

                let code = FunctionCode::Image {
                    uri: built.image_name.clone(),
                };
                (code, Some(built.image_name))
            }
            ArtifactBuilder::Zip(packager) => {
                advance(fsm, PipelineEvent::StartPackage)?;
                let runtime = runtime_for(&job.python_version)
                    .map_err(|e| PipelineError::Publish(e.into()))?;
                debug!(stage = fsm.state().as_str(), %runtime, "packaging zip");
                let bytes = packager
                    .package(&job.bundle, &job.work_dir, &job.service, &job.python_version)
                    .await?;
                advance(fsm, PipelineEvent::Built)?;

                let code = FunctionCode::Zip {
                    bytes,
                    runtime,
                    handler: ADAPTER_HANDLER.to_string(),
                };
                (code, None)
            }
        };

        let function_name = job.function_name();
        debug!(stage = fsm.state().as_str(), function = %function_name, "publishing function");
        let outcome = self
            .deps
            .publisher
            .publish(&function_name, code, &job.environment)
            .await?;
        advance(fsm, PipelineEvent::Published)?;

        Ok((image, outcome.action))
    }

    /// Write the service row under the lazily created deployment
    async fn record(&self, job: &PipelineJob) -> Result<i64, PipelineError> {
        let deployment = self
            .deps
            .store
            .get_or_create_deployment(job.user_id, &job.git_hash)
            .await?;
        self.deps
            .store
            .upsert_service(deployment.id, &job.service.name)
            .await?;
        Ok(deployment.id)
    }
}
