//! Current git hash

use api_models::{validate, GIT_HASH_LEN};
use tokio::process::Command;
use tracing::debug;

use crate::console;
use crate::errors::CliError;
use crate::settings::CliSettings;

/// Resolve the short hash deployments are versioned by.
///
/// An explicit or CI-provided hash wins; otherwise `git rev-parse HEAD` is
/// asked. Either way the result is truncated to its short form.
pub async fn resolve_git_hash(settings: &CliSettings) -> Result<String, CliError> {
    let full = match &settings.git_hash {
        Some(hash) => {
            if hash.len() > GIT_HASH_LEN {
                console::warning(&format!(
                    "Git hash '{}' is longer than {} characters, using the first {}",
                    hash, GIT_HASH_LEN, GIT_HASH_LEN
                ));
            }
            hash.clone()
        }
        None => head_hash().await?,
    };
    Ok(validate::git_hash(&full)?)
}

async fn head_hash() -> Result<String, CliError> {
    let clean = Command::new("git")
        .args(["diff", "--quiet"])
        .status()
        .await
        .map_err(|e| CliError::GitHash(e.to_string()))?;
    if !clean.success() {
        console::warning("Git state is not clean, using the last commit hash");
    }

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .await
        .map_err(|e| CliError::GitHash(e.to_string()))?;
    if !output.status.success() {
        return Err(CliError::GitHash(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(hash = %hash, "resolved git hash from HEAD");
    Ok(hash)
}
