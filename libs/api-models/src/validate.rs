//! Field validation rules shared by the CLI and the server

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::ConfigError;
use crate::GIT_HASH_LEN;

static SERVICE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{1,40}$").unwrap_or_else(|e| panic!("{e}")));

static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{1,40}$").unwrap_or_else(|e| panic!("{e}")));

static MODULE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .unwrap_or_else(|e| panic!("{e}"))
});

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("{e}")));

static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap_or_else(|e| panic!("{e}")));

/// Python versions with a matching serverless base image and runtime
pub const SUPPORTED_PYTHON_VERSIONS: &[&str] = &["3.8", "3.9", "3.10", "3.11", "3.12", "3.13"];

/// Check a service name.
///
/// Underscore is reserved: it separates user, service and version in
/// function names, and the registry pull policy relies on it.
pub fn service_name(name: &str) -> Result<(), ConfigError> {
    if SERVICE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidServiceName(name.to_string()))
    }
}

/// Check a username.
///
/// Usernames namespace every repository and function, so they are
/// lowercase only: two users can never map to the same resource names.
pub fn username(name: &str) -> Result<(), ConfigError> {
    if USERNAME.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUsername(name.to_string()))
    }
}

/// Check a git hash and return it lowercased and truncated to the short form
pub fn git_hash(hash: &str) -> Result<String, ConfigError> {
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::InvalidGitHash(hash.to_string()));
    }
    Ok(hash
        .chars()
        .take(GIT_HASH_LEN)
        .map(|c| c.to_ascii_lowercase())
        .collect())
}

/// Split a `module:symbol` target reference
pub fn target_path(path: &str) -> Result<(&str, &str), ConfigError> {
    let invalid = || ConfigError::InvalidTargetPath(path.to_string());

    let mut parts = path.split(':');
    let (Some(module), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if !MODULE_PATH.is_match(module) || !IDENTIFIER.is_match(symbol) {
        return Err(invalid());
    }
    Ok((module, symbol))
}

/// Check a python version string
pub fn python_version(version: &str) -> Result<(), ConfigError> {
    if SUPPORTED_PYTHON_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedPythonVersion(version.to_string()))
    }
}

/// Check an environment variable name
pub fn environment_variable(name: &str) -> Result<(), ConfigError> {
    if ENV_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvironmentVariable(name.to_string()))
    }
}
