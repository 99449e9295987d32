//! Project manifest (`pare.json`)
//!
//! ```json
//! {
//!   "python_version": "3.12",
//!   "environment": {"STAGE": "prod"},
//!   "services": [
//!     {"name": "api", "entrypoint": "app.api:handler", "dependencies": ["requests"]}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use api_models::{DeployConfig, ServiceRegistration, ServiceRegistry};
use serde::Deserialize;

use crate::errors::CliError;

pub const DEFAULT_MANIFEST: &str = "pare.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub python_version: Option<String>,

    #[serde(default)]
    pub environment: BTreeMap<String, String>,

    pub services: Vec<ServiceRegistration>,
}

impl Manifest {
    pub async fn load(path: &Path) -> Result<Self, CliError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CliError::Manifest(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, CliError> {
        serde_json::from_str(json).map_err(|e| CliError::Manifest(e.to_string()))
    }

    /// Register every declared service. A repeated name is fatal.
    pub fn registry(&self) -> Result<ServiceRegistry, CliError> {
        let mut registry = ServiceRegistry::new();
        for service in &self.services {
            registry.add(service.clone())?;
        }
        Ok(registry)
    }

    /// Build the deploy request. Command-line variables override manifest ones.
    pub fn deploy_config(
        &self,
        git_hash: String,
        default_python_version: &str,
        overrides: BTreeMap<String, String>,
    ) -> Result<DeployConfig, CliError> {
        let mut environment_variables = self.environment.clone();
        environment_variables.extend(overrides);

        let config = DeployConfig {
            git_hash,
            python_version: self
                .python_version
                .clone()
                .unwrap_or_else(|| default_python_version.to_string()),
            environment_variables,
            services: self.registry()?.to_service_configs(),
        };
        Ok(config.validated()?)
    }
}

/// Parse repeated `-e KEY=VALUE` flags. The value may itself contain `=`.
pub fn parse_env_vars(pairs: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::InvalidEnvVar(pair.clone())),
        })
        .collect()
}
