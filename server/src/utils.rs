//! Utility functions

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version information for the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Exponential backoff: `initial * 2^attempt`, saturating
pub fn calc_exp_backoff(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    initial.saturating_mul(factor)
}

/// Hex-encoded SHA-256 digest
pub fn sha256_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
