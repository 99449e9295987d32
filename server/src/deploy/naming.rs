//! Resource names derived from a user, a service and a deployment version
//!
//! Parts are joined with `_` and used as stored. Usernames, service names
//! and git hashes are lowercase by the time they get here and never contain
//! `_`, so a repository name is a strict prefix of exactly the functions
//! belonging to that user and service.

use api_models::ConfigError;

/// Longest function name the function provider accepts
pub const MAX_FUNCTION_NAME_LEN: usize = 64;

/// `{user}_{service}`
pub fn repository_name(user: &str, service: &str) -> String {
    format!("{}_{}", user, service)
}

/// `{user}_{service}_{git_hash}`
pub fn function_name(user: &str, service: &str, git_hash: &str) -> String {
    format!("{}_{}", repository_name(user, service), git_hash)
}

/// `{git_hash}-{python_version}`
pub fn image_tag(git_hash: &str, python_version: &str) -> String {
    format!("{}-{}", git_hash, python_version)
}

/// `{registry-domain}/{repository}:{tag}`
pub fn image_name(registry_domain: &str, repository: &str, tag: &str) -> String {
    format!("{}/{}:{}", registry_domain, repository, tag)
}

/// Reject function names the provider would refuse
pub fn check_function_name(name: &str) -> Result<(), ConfigError> {
    if name.len() > MAX_FUNCTION_NAME_LEN {
        return Err(ConfigError::FunctionNameTooLong(
            name.to_string(),
            MAX_FUNCTION_NAME_LEN,
        ));
    }
    Ok(())
}
