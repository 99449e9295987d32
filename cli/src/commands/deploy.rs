//! `pare deploy`

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use crate::bundle::SourceFiles;
use crate::client::ApiClient;
use crate::console;
use crate::git::resolve_git_hash;
use crate::manifest::{parse_env_vars, Manifest, DEFAULT_MANIFEST};
use crate::settings::CliSettings;

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Python files to bundle, relative to the project root
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Environment variable for every service, as KEY=VALUE. Repeatable.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Manifest registering the services to deploy
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Python version to build with. Overrides the manifest.
    #[arg(long, value_name = "VERSION")]
    pub python_version: Option<String>,
}

pub async fn execute(args: DeployArgs, settings: &CliSettings) -> Result<()> {
    console::step("Deploying...");

    // everything that can be checked locally is checked before any network call
    let files = match SourceFiles::collect(&args.files).await {
        Ok(files) => files,
        Err(errors) => {
            for error in &errors {
                console::error(&error.to_string());
            }
            bail!("{} invalid file(s)", errors.len());
        }
    };
    let mut manifest = Manifest::load(&args.manifest).await?;
    if let Some(version) = args.python_version {
        manifest.python_version = Some(version);
    }
    files.check_entrypoints(&manifest.registry()?)?;

    let overrides = parse_env_vars(&args.env)?;
    let git_hash = resolve_git_hash(settings).await?;
    let config = manifest.deploy_config(git_hash, &settings.python_version, overrides)?;
    let client = ApiClient::new(settings)?;

    let bundle = files.bundle().await?;
    console::success(&format!("Project bundled ({} files)", files.len()));
    info!(
        git_hash = %config.git_hash,
        services = config.services.len(),
        bundle_bytes = bundle.len(),
        "uploading bundle"
    );

    let result = client.deploy(&config, bundle).await?;
    for line in console::deploy_report(&result) {
        println!("  {}", line);
    }

    if !result.is_success() {
        bail!(
            "{} of {} services failed to deploy",
            result.failed.len(),
            config.services.len()
        );
    }
    console::success(&format!("Deployed! (git hash: {})", config.git_hash));
    Ok(())
}
