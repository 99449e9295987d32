//! Deployment manifest and result

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::validate;

/// One function to deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    /// `module:symbol` reference to the target callable
    pub path: String,
    pub requirements: Vec<String>,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate::service_name(&self.name)?;
        validate::target_path(&self.path)?;
        Ok(())
    }
}

/// One deployment request.
///
/// Every field is required and unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub git_hash: String,
    pub python_version: String,
    pub environment_variables: BTreeMap<String, String>,
    pub services: Vec<ServiceConfig>,
}

impl DeployConfig {
    /// Parse and validate a JSON manifest
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DeployConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validated()
    }

    /// Validate every field and return the normalized config: the git hash
    /// truncated to its short form, and the git hash and service names
    /// lowercased so stored names match resource names.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.git_hash = validate::git_hash(&self.git_hash)?;
        validate::python_version(&self.python_version)?;
        for name in self.environment_variables.keys() {
            validate::environment_variable(name)?;
        }

        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }
        let mut seen = HashSet::new();
        for service in &mut self.services {
            service.validate()?;
            service.name.make_ascii_lowercase();
            if !seen.insert(service.name.clone()) {
                return Err(ConfigError::DuplicateService(service.name.clone()));
            }
        }
        Ok(self)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// Aggregate outcome of a deployment, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl DeployResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
