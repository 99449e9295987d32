//! Server settings
//!
//! Loaded once at start-up from a JSON file, then overridden from the
//! environment. Components receive the parts they need by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::errors::ServerError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Optional directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cloud: CloudSettings,

    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub publish: PublishSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Read settings from a JSON file, or use defaults when no file is given
    pub async fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        match path {
            Some(path) => File::new(path)
                .read_json::<Settings>()
                .await
                .map_err(|e| {
                    ServerError::Startup(format!(
                        "Unable to read settings file {}: {}",
                        path.display(),
                        e
                    ))
                }),
            None => Ok(Settings::default()),
        }
    }

    /// Apply environment overrides for secrets and deployment-specific values
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(SecretString::from(url));
        }
        if let Some(account_id) = lookup("AWS_ACCOUNT_ID") {
            self.cloud.account_id = account_id;
        }
        if let Some(region) = lookup("AWS_DEFAULT_REGION") {
            self.cloud.region = region;
        }
        if let Some(role) = lookup("LAMBDA_ROLE_ARN") {
            self.cloud.lambda_role_arn = role;
        }
        if let Some(key) = lookup("PARE_DEV_API_KEY") {
            self.auth.dev_api_key = Some(key);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_mb() -> usize {
    50
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Postgres connection URL. The in-memory store is used when unset.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub url: Option<SecretString>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(SecretString::from))
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProviderKind {
    /// AWS ECR and Lambda (requires the `aws` feature)
    Aws,
    /// In-process registry and functions, for local dry runs
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudSettings {
    #[serde(default)]
    pub provider: CloudProviderKind,

    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Registry host suffix. Defaults to `dkr.ecr.{region}.amazonaws.com`.
    #[serde(default)]
    pub registry_host: Option<String>,

    #[serde(default)]
    pub lambda_role_arn: String,
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            provider: CloudProviderKind::default(),
            account_id: default_account_id(),
            region: default_region(),
            registry_host: None,
            lambda_role_arn: String::new(),
        }
    }
}

impl CloudSettings {
    /// `{account}.{registry-host}` prefix of every image reference
    pub fn registry_domain(&self) -> String {
        match &self.registry_host {
            Some(host) => format!("{}.{}", self.account_id, host),
            None => format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region),
        }
    }

    /// ARN prefix shared by every function in this account and region
    pub fn function_arn_prefix(&self) -> String {
        format!("arn:aws:lambda:{}:{}:function:", self.region, self.account_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    #[default]
    Image,
    Zip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSettings {
    /// Container build-and-push executable
    #[serde(default = "default_build_tool")]
    pub tool: String,

    /// Runtime package added to every service's dependencies
    #[serde(default = "default_sdk_requirement")]
    pub sdk_requirement: String,

    #[serde(default)]
    pub package_type: PackageType,

    /// Installer used to vendor dependencies for zip packages
    #[serde(default = "default_pip")]
    pub pip: String,

    #[serde(default = "default_pip_platform")]
    pub pip_platform: String,

    /// Parent of per-request scratch directories. System temp dir when unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_build_tool() -> String {
    "docker".to_string()
}

fn default_sdk_requirement() -> String {
    "pare".to_string()
}

fn default_pip() -> String {
    "pip".to_string()
}

fn default_pip_platform() -> String {
    "manylinux2014_x86_64".to_string()
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            tool: default_build_tool(),
            sdk_requirement: default_sdk_requirement(),
            package_type: PackageType::default(),
            pip: default_pip(),
            pip_platform: default_pip_platform(),
            work_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishSettings {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Attempts made for an update that keeps conflicting
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl PublishSettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_max_concurrent_pipelines")]
    pub max_concurrent_pipelines: usize,

    #[serde(default = "default_pipeline_timeout_secs")]
    pub pipeline_timeout_secs: u64,

    #[serde(default = "default_max_deployments_per_user")]
    pub max_deployments_per_user: u32,
}

fn default_max_concurrent_pipelines() -> usize {
    4
}

fn default_pipeline_timeout_secs() -> u64 {
    900
}

fn default_max_deployments_per_user() -> u32 {
    100
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_pipelines: default_max_concurrent_pipelines(),
            pipeline_timeout_secs: default_pipeline_timeout_secs(),
            max_deployments_per_user: default_max_deployments_per_user(),
        }
    }
}

impl OrchestratorSettings {
    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default = "default_atomic_deployment_header")]
    pub atomic_deployment_header: String,

    /// API key of a `dev` user seeded into the in-memory store
    #[serde(default)]
    pub dev_api_key: Option<String>,
}

fn default_api_key_header() -> String {
    "X-Pare-API-Key".to_string()
}

fn default_atomic_deployment_header() -> String {
    "X-Pare-Atomic-Deployment".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            api_key_header: default_api_key_header(),
            atomic_deployment_header: default_atomic_deployment_header(),
            dev_api_key: None,
        }
    }
}
