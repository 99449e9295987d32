//! Error types for the Pare deploy server

use std::time::Duration;

use api_models::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure reported by a container registry or function provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource conflict: {0}")]
    Conflict(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Provider error {code}: {message}")]
    Other { code: String, message: String },
}

impl ProviderError {
    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Other {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Classify a provider error code as reported by the cloud API
    pub fn from_code(code: Option<&str>, message: Option<&str>) -> Self {
        let message = message.unwrap_or_default().to_string();
        match code {
            Some("ResourceNotFoundException" | "RepositoryNotFoundException") => {
                ProviderError::NotFound(message)
            }
            Some("RepositoryAlreadyExistsException" | "ResourceAlreadyExistsException") => {
                ProviderError::AlreadyExists(message)
            }
            Some("ResourceConflictException") => ProviderError::Conflict(message),
            Some("TooManyRequestsException" | "ThrottlingException") => {
                ProviderError::Throttled(message)
            }
            Some(code) => ProviderError::other(code, message),
            None => ProviderError::other("Unknown", message),
        }
    }

    /// Short code used in structured logs
    pub fn code(&self) -> &str {
        match self {
            ProviderError::NotFound(_) => "NotFound",
            ProviderError::AlreadyExists(_) => "AlreadyExists",
            ProviderError::Conflict(_) => "Conflict",
            ProviderError::Throttled(_) => "Throttled",
            ProviderError::Other { code, .. } => code,
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },
}

impl From<zip::result::ZipError> for BuildError {
    fn from(err: zip::result::ZipError) -> Self {
        BuildError::Archive(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Max retries reached after {attempts} attempts, function update failed")]
    RetriesExhausted { attempts: u32 },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn internal(msg: impl Into<String>) -> Self {
        StoreError::Internal(msg.into())
    }
}

/// Why a single service pipeline did not deploy
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Registry setup failed: {0}")]
    Registry(#[source] ProviderError),

    #[error("Function publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Recording service failed: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Pipeline task aborted: {0}")]
    Aborted(String),
}

/// Request-level deployment failure. Raised before any pipeline starts.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid bundle archive: {0}")]
    InvalidArchive(String),

    #[error("Deployment quota of {limit} exceeded")]
    QuotaExceeded { limit: u32 },

    #[error("User '{0}' is blocked")]
    Blocked(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level server error, rendered as `{"detail": ...}`
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Internal(_) | ServerError::Startup(_) | ServerError::Shutdown(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Unprocessable(err.to_string())
    }
}

impl From<DeployError> for ServerError {
    fn from(err: DeployError) -> Self {
        match err {
            DeployError::Config(e) => e.into(),
            DeployError::InvalidArchive(_) => ServerError::BadRequest(err.to_string()),
            DeployError::QuotaExceeded { .. } | DeployError::Blocked(_) => {
                ServerError::Forbidden(err.to_string())
            }
            DeployError::Store(e) => e.into(),
            DeployError::Io(_) => ServerError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<ProviderError> for ServerError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => ServerError::NotFound(err.to_string()),
            ProviderError::Conflict(_) | ProviderError::AlreadyExists(_) => {
                ServerError::Conflict(err.to_string())
            }
            ProviderError::Throttled(_) | ProviderError::Other { .. } => {
                ServerError::Internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}
