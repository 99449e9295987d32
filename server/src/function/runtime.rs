//! Python runtime identifiers

use api_models::validate::SUPPORTED_PYTHON_VERSIONS;
use api_models::ConfigError;

/// Map a python version (`3.12`) to the platform runtime (`python3.12`)
pub fn runtime_for(python_version: &str) -> Result<String, ConfigError> {
    if SUPPORTED_PYTHON_VERSIONS.contains(&python_version) {
        Ok(format!("python{}", python_version))
    } else {
        Err(ConfigError::UnsupportedPythonVersion(python_version.to_string()))
    }
}

/// Whether `runtime` is one of the identifiers [`runtime_for`] produces
pub fn is_supported_runtime(runtime: &str) -> bool {
    runtime
        .strip_prefix("python")
        .is_some_and(|version| SUPPORTED_PYTHON_VERSIONS.contains(&version))
}
