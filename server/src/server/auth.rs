//! Request extractors for the API key and the atomic deployment header

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::errors::ServerError;
use crate::models::User;
use crate::server::state::ServerState;
use crate::storage::DeploymentSelector;

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Caller resolved from the API key header. Blocked users are rejected.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<Arc<ServerState>> for AuthenticatedUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let unauthenticated = || ServerError::Unauthorized("Unauthenticated".to_string());

        let api_key = header(parts, &state.auth.api_key_header).ok_or_else(unauthenticated)?;
        let user = state
            .store
            .get_user_by_api_key(api_key)
            .await?
            .ok_or_else(unauthenticated)?;

        if user.is_blocked {
            debug!(user = %user.username, "rejected blocked user");
            return Err(ServerError::Forbidden(format!(
                "User '{}' is blocked",
                user.username
            )));
        }
        Ok(AuthenticatedUser(user))
    }
}

/// Deployment selected by the atomic deployment header
#[derive(Debug, Clone)]
pub struct AtomicVersion(pub DeploymentSelector);

impl FromRequestParts<Arc<ServerState>> for AtomicVersion {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerState>,
    ) -> Result<Self, Self::Rejection> {
        let name = &state.auth.atomic_deployment_header;
        let value = header(parts, name).ok_or_else(|| {
            ServerError::BadRequest(format!("Must provide '{}' header.", name))
        })?;
        Ok(AtomicVersion(DeploymentSelector::parse(value)))
    }
}
