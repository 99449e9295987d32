//! Container image builds
//!
//! Assembles a build context per service and drives the external
//! build-and-push tool:
//!
//! ```text
//! <work>/Dockerfile
//! <work>/requirements.txt
//! <work>/build-root/...            bundle contents
//! <work>/build-root/lambda_function.py
//! ```

use std::sync::Arc;

use api_models::ServiceConfig;
use tracing::{debug, info, warn};

use crate::build::adapter::{render_adapter, ADAPTER_FILE_NAME};
use crate::build::runner::{CommandRunner, CommandSpec};
use crate::errors::BuildError;
use crate::filesys::dir::Dir;

const DOCKERFILE_TEMPLATE: &str = include_str!("../../templates/Dockerfile.py_lambda");

/// Directory inside the build context holding the bundle
pub const BUILD_ROOT: &str = "build-root";

/// Outcome of a successful build-and-push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub exit_code: i32,
    pub image_name: String,
    pub stdout: String,
    pub stderr: String,
}

/// Inputs for one image build
#[derive(Debug, Clone)]
pub struct ImageBuildRequest<'a> {
    /// Unpacked bundle shared by every service of the request
    pub bundle: &'a Dir,
    /// Scratch directory owned by this service's pipeline
    pub work_dir: &'a Dir,
    pub service: &'a ServiceConfig,
    pub python_version: &'a str,
    /// Fully-qualified image reference to push
    pub image_name: &'a str,
}

pub struct ImageBuilder {
    runner: Arc<dyn CommandRunner>,
    tool: String,
    sdk_requirement: String,
}

impl ImageBuilder {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        tool: impl Into<String>,
        sdk_requirement: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            tool: tool.into(),
            sdk_requirement: sdk_requirement.into(),
        }
    }

    /// Build and push the image for one service.
    ///
    /// A malformed target path fails before the work directory is touched.
    /// A non-zero exit from the tool is returned as
    /// [`BuildError::ToolFailed`] carrying its stderr.
    pub async fn build(&self, request: &ImageBuildRequest<'_>) -> Result<BuildResult, BuildError> {
        let adapter = render_adapter(&request.service.path)?;

        let work_dir = request.work_dir;
        work_dir.create().await?;
        work_dir
            .file("Dockerfile")
            .write_string(DOCKERFILE_TEMPLATE)
            .await?;

        let build_root = work_dir.subdir(BUILD_ROOT);
        request.bundle.copy_to(&build_root).await?;
        build_root.file(ADAPTER_FILE_NAME).write_string(&adapter).await?;

        work_dir
            .file("requirements.txt")
            .write_string(&self.requirements(request.service))
            .await?;

        let command = self.build_command(request);
        info!(
            service = %request.service.name,
            image = %request.image_name,
            "building image"
        );

        let output = self.runner.run(&command).await?;
        debug!(service = %request.service.name, stdout = %output.stdout, "build output");

        if !output.success() {
            warn!(
                service = %request.service.name,
                exit_code = output.exit_code,
                stderr = %output.stderr,
                "image build failed"
            );
            return Err(BuildError::ToolFailed {
                tool: self.tool.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        Ok(BuildResult {
            exit_code: output.exit_code,
            image_name: request.image_name.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn requirements(&self, service: &ServiceConfig) -> String {
        service
            .requirements
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.sdk_requirement.as_str()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn build_command(&self, request: &ImageBuildRequest<'_>) -> CommandSpec {
        // --push assumes the tool is already authenticated with the registry
        CommandSpec::new(&self.tool, request.work_dir.path()).args([
            "build".to_string(),
            "--push".to_string(),
            "-t".to_string(),
            request.image_name.to_string(),
            "--build-arg".to_string(),
            format!("PYTHON_VERSION={}", request.python_version),
            "--provenance=false".to_string(),
            request.work_dir.path().display().to_string(),
        ])
    }
}
