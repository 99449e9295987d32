//! CLI settings, read from the environment
//!
//! The API key comes from `PARE_API_KEY` or, failing that, from the key
//! file (`.pare/api_key.priv` by default).

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};

use crate::errors::CliError;

pub const DEFAULT_API_URL: &str = "https://api.pare.gauge.sh";
pub const DEFAULT_API_KEY_FILE: &str = ".pare/api_key.priv";
pub const DEFAULT_API_KEY_HEADER: &str = "X-Pare-API-Key";
pub const DEFAULT_ATOMIC_DEPLOYMENT_HEADER: &str = "X-Pare-Atomic-Deployment";
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// CI variables holding the commit being built, checked in order
pub const KNOWN_GIT_HASH_VARS: &[&str] = &[
    "GITHUB_SHA",
    "CI_COMMIT_SHA",
    "GIT_COMMIT",
    "CIRCLE_SHA1",
    "TRAVIS_COMMIT",
    "BUILD_SOURCEVERSION",
    "BITBUCKET_COMMIT",
    "BUILD_VCS_NUMBER",
    "DRONE_COMMIT_SHA",
    "CODEBUILD_RESOLVED_SOURCE_VERSION",
];

#[derive(Debug, Clone)]
pub struct CliSettings {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub api_key_file: PathBuf,
    pub api_key_header: String,
    pub atomic_deployment_header: String,
    /// Explicit or CI-provided git hash. `git rev-parse` is the fallback.
    pub git_hash: Option<String>,
    pub python_version: String,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            api_key_file: PathBuf::from(DEFAULT_API_KEY_FILE),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            atomic_deployment_header: DEFAULT_ATOMIC_DEPLOYMENT_HEADER.to_string(),
            git_hash: None,
            python_version: DEFAULT_PYTHON_VERSION.to_string(),
        }
    }
}

impl CliSettings {
    pub async fn load() -> Result<Self, CliError> {
        Self::from_lookup(|key| std::env::var(key).ok()).await
    }

    pub async fn from_lookup<F>(lookup: F) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Self::default();

        if let Some(url) = lookup("PARE_API_URL") {
            settings.api_url = url;
        }
        if let Some(header) = lookup("PARE_API_KEY_HEADER") {
            settings.api_key_header = header;
        }
        if let Some(header) = lookup("PARE_ATOMIC_DEPLOYMENT_HEADER") {
            settings.atomic_deployment_header = header;
        }
        if let Some(version) = lookup("PARE_PYTHON_VERSION") {
            settings.python_version = version;
        }
        if let Some(path) = lookup("PARE_API_KEY_FILE") {
            settings.api_key_file = PathBuf::from(path);
        }

        settings.git_hash = lookup("PARE_GIT_HASH")
            .or_else(|| KNOWN_GIT_HASH_VARS.iter().find_map(|var| lookup(*var)));

        settings.api_key = match lookup("PARE_API_KEY") {
            Some(key) => Some(SecretString::from(key)),
            None => read_key_file(&settings.api_key_file).await?,
        };
        Ok(settings)
    }

    /// The API key, or an error telling the user where to put one
    pub fn require_api_key(&self) -> Result<&str, CliError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| CliError::MissingApiKey(self.api_key_file.display().to_string()))
    }
}

async fn read_key_file(path: &Path) -> Result<Option<SecretString>, CliError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let key = contents.trim();
            Ok((!key.is_empty()).then(|| SecretString::from(key.to_string())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
