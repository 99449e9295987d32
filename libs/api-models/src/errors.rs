//! Configuration errors

use thiserror::Error;

/// A deployment manifest or service declaration that can never deploy.
///
/// These are rejected before any build, registry or function call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Malformed deployment manifest: {0}")]
    Malformed(String),

    #[error("Deployment declares no services")]
    NoServices,

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Invalid service name '{0}': use 1-40 letters, digits or '-'")]
    InvalidServiceName(String),

    #[error("Invalid username '{0}': use 1-40 lowercase letters, digits or '-'")]
    InvalidUsername(String),

    #[error("Invalid git hash '{0}': expected ASCII letters and digits")]
    InvalidGitHash(String),

    #[error("Could not resolve module path and target symbol from: '{0}'")]
    InvalidTargetPath(String),

    #[error("Unsupported python version: {0}")]
    UnsupportedPythonVersion(String),

    #[error("Invalid environment variable name: '{0}'")]
    InvalidEnvironmentVariable(String),

    #[error("Function name '{0}' exceeds {1} characters")]
    FunctionNameTooLong(String, usize),
}
