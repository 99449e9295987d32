//! Explicit service registration
//!
//! Services are declared by name, entrypoint and dependencies through a
//! [`ServiceRegistry`] builder. Declaring the same name twice is fatal.

use serde::{Deserialize, Serialize};

use crate::deploy::ServiceConfig;
use crate::errors::ConfigError;
use crate::validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceRegistration {
    pub name: String,
    /// `module:symbol`
    pub entrypoint: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ServiceRegistry {
    services: Vec<ServiceRegistration>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        entrypoint: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Result<&mut Self, ConfigError> {
        self.add(ServiceRegistration {
            name: name.into(),
            entrypoint: entrypoint.into(),
            dependencies,
        })
    }

    pub fn add(&mut self, registration: ServiceRegistration) -> Result<&mut Self, ConfigError> {
        validate::service_name(&registration.name)?;
        validate::target_path(&registration.entrypoint)?;
        if self
            .services
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&registration.name))
        {
            return Err(ConfigError::DuplicateService(registration.name));
        }
        self.services.push(registration);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn registrations(&self) -> &[ServiceRegistration] {
        &self.services
    }

    /// Service declarations in registration order
    pub fn to_service_configs(&self) -> Vec<ServiceConfig> {
        self.services
            .iter()
            .map(|s| ServiceConfig {
                name: s.name.clone(),
                path: s.entrypoint.clone(),
                requirements: s.dependencies.clone(),
            })
            .collect()
    }
}
