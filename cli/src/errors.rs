//! CLI errors

use api_models::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("{path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("Environment variables must be in the format KEY=VALUE, got '{0}'")]
    InvalidEnvVar(String),

    #[error("No API key found. Set PARE_API_KEY or write the key to '{0}'")]
    MissingApiKey(String),

    #[error("API key contains characters that are not valid in an HTTP header")]
    InvalidApiKey,

    #[error("Unable to determine the current git hash: {0}")]
    GitHash(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
