//! Zip function packages
//!
//! Vendors a service's dependencies with pip for the function platform,
//! adds the adapter shim and merges both with the bundle into one archive.

use std::sync::Arc;

use api_models::ServiceConfig;
use tracing::{info, warn};

use crate::build::adapter::write_adapter;
use crate::build::runner::{CommandRunner, CommandSpec};
use crate::errors::BuildError;
use crate::filesys::dir::Dir;
use crate::packaging::zip_dirs;

const VENDOR_DIR: &str = "package";

pub struct ZipPackager {
    runner: Arc<dyn CommandRunner>,
    pip: String,
    platform: String,
    sdk_requirement: String,
}

impl ZipPackager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        pip: impl Into<String>,
        platform: impl Into<String>,
        sdk_requirement: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            pip: pip.into(),
            platform: platform.into(),
            sdk_requirement: sdk_requirement.into(),
        }
    }

    /// Produce the zip package bytes for one service
    pub async fn package(
        &self,
        bundle: &Dir,
        work_dir: &Dir,
        service: &ServiceConfig,
        python_version: &str,
    ) -> Result<Vec<u8>, BuildError> {
        let vendor = work_dir.subdir(VENDOR_DIR);
        // validates the target path before anything is installed
        write_adapter(&service.path, vendor.path()).await?;

        let command = self.install_command(&vendor, service, python_version);
        info!(service = %service.name, python_version, "vendoring dependencies");
        let output = self.runner.run(&command).await?;
        if !output.success() {
            warn!(
                service = %service.name,
                exit_code = output.exit_code,
                stderr = %output.stderr,
                "dependency install failed"
            );
            return Err(BuildError::ToolFailed {
                tool: self.pip.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        zip_dirs(&[bundle.clone(), vendor]).await
    }

    fn install_command(&self, vendor: &Dir, service: &ServiceConfig, python_version: &str) -> CommandSpec {
        CommandSpec::new(&self.pip, vendor.path())
            .args([
                "install",
                "--platform",
                self.platform.as_str(),
                "--implementation",
                "cp",
                "--python-version",
                python_version,
                "--only-binary",
                ":all:",
                "--target",
            ])
            .arg(vendor.path().display().to_string())
            .arg("--upgrade")
            .args(service.requirements.iter().cloned())
            .arg(self.sdk_requirement.clone())
    }
}
