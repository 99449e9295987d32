//! Pare API models
//!
//! Wire types exchanged between the `pare` CLI and the deploy API server.

pub mod deploy;
pub mod errors;
pub mod registry;
pub mod services;
pub mod validate;

pub use deploy::{DeployConfig, DeployResult, ServiceConfig};
pub use errors::ConfigError;
pub use registry::{ServiceRegistration, ServiceRegistry};
pub use services::{DeploymentSchema, ServiceSchema};

/// API version prefix used by every versioned route
pub const API_VERSION: &str = "v0.1";

/// Length git hashes are truncated to
pub const GIT_HASH_LEN: usize = 7;
