//! HTTP request handlers

use std::sync::Arc;

use api_models::{DeployConfig, ServiceSchema};
use api_models::services::DeletedService;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::deploy::naming;
use crate::errors::{ProviderError, ServerError};
use crate::models::{ServiceRecord, User};
use crate::server::auth::{AtomicVersion, AuthenticatedUser};
use crate::server::state::ServerState;
use crate::utils::{sha256_hash, version_info};

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deploy a bundle.
///
/// Multipart fields: `file` (zip bundle) and `json_data` (deployment
/// manifest). Responds 200 when every service deployed, 500 with the same
/// body when any failed.
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let mut bundle: Option<Vec<u8>> = None;
    let mut json_data: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                bundle = Some(bytes.to_vec());
            }
            Some("json_data") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?;
                json_data = Some(text);
            }
            _ => {}
        }
    }

    let json_data = json_data
        .ok_or_else(|| ServerError::Unprocessable("Missing 'json_data' field".to_string()))?;
    let config = DeployConfig::from_json(&json_data)?;
    let bundle =
        bundle.ok_or_else(|| ServerError::BadRequest("Missing 'file' field".to_string()))?;

    info!(
        user = %user.username,
        git_hash = %config.git_hash,
        bundle_bytes = bundle.len(),
        bundle_sha256 = %sha256_hash(&bundle),
        "deploy requested"
    );
    let result = state.orchestrator.deploy(&user, config, bundle).await?;

    let status = if result.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(result)).into_response())
}

/// List the caller's services
pub async fn list_services_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<ServiceSchema>>, ServerError> {
    let records = state.store.list_services(user.id).await?;
    Ok(Json(records.iter().map(ServiceRecord::to_schema).collect()))
}

async fn service_for_user(
    state: &ServerState,
    user: &User,
    name: &str,
    version: &AtomicVersion,
) -> Result<ServiceRecord, ServerError> {
    state
        .store
        .find_service(user.id, &name.to_ascii_lowercase(), &version.0)
        .await?
        .ok_or_else(|| ServerError::NotFound("Service not found for deploy version".to_string()))
}

fn versioned_function(user: &User, record: &ServiceRecord) -> String {
    naming::function_name(
        &user.username,
        &record.service.name,
        &record.deployment.git_hash,
    )
}

/// One service, selected by the atomic deployment header
pub async fn get_service_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    version: AtomicVersion,
    Path(service_name): Path<String>,
) -> Result<Json<ServiceSchema>, ServerError> {
    let record = service_for_user(&state, &user, &service_name, &version).await?;
    Ok(Json(record.to_schema()))
}

/// Delete the versioned function, then its service row
pub async fn delete_service_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    version: AtomicVersion,
    Path(service_name): Path<String>,
) -> Result<Json<DeletedService>, ServerError> {
    let record = service_for_user(&state, &user, &service_name, &version).await?;
    let function = versioned_function(&user, &record);

    state.functions.delete_function(&function).await.map_err(|e| {
        warn!(function = %function, code = e.code(), error = %e, "failed to delete function");
        match e {
            ProviderError::NotFound(_) => {
                ServerError::NotFound(format!("Function '{}' not found", function))
            }
            ProviderError::Conflict(_) => ServerError::Conflict(format!(
                "Function '{}' is in use or being updated",
                function
            )),
            other => other.into(),
        }
    })?;
    state.store.delete_service(record.service.id).await?;
    info!(user = %user.username, function = %function, "deleted service");

    Ok(Json(DeletedService {
        name: record.service.name,
        git_hash: record.deployment.git_hash,
    }))
}

/// Invoke the versioned function synchronously with the request body as payload
pub async fn invoke_service_handler(
    State(state): State<Arc<ServerState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    version: AtomicVersion,
    Path(service_name): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let record = service_for_user(&state, &user, &service_name, &version).await?;
    let function = versioned_function(&user, &record);

    let payload: &[u8] = if body.is_empty() { b"{}" } else { &body };
    let response = state.functions.invoke(&function, payload).await?;

    let value = serde_json::from_slice(&response).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&response).into_owned())
    });
    Ok(Json(value))
}
