//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use api_models::API_VERSION;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::ServerError;
use crate::server::handlers::{
    delete_service_handler, deploy_handler, get_service_handler, health_handler,
    invoke_service_handler, list_services_handler, version_handler,
};
use crate::server::state::ServerState;
use crate::storage::settings::ServerSettings;

/// Build the API router
pub fn router(state: Arc<ServerState>, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/deploy/", post(deploy_handler))
        .route("/services/", get(list_services_handler))
        .route("/services/{service_name}/", get(get_service_handler))
        .route("/services/delete/{service_name}/", delete(delete_service_handler))
        .route("/services/invoke/{service_name}/", post(invoke_service_handler));

    Router::new()
        // Health and version
        .route("/healthcheck", get(health_handler))
        .route("/version", get(version_handler))
        .nest(&format!("/{}", API_VERSION), api)
        // State and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    settings: &ServerSettings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ServerError>>, ServerError> {
    let app = router(state, settings.max_upload_mb.saturating_mul(1024 * 1024));

    let addr = format!("{}:{}", settings.host, settings.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Startup(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::Shutdown(e.to_string()))
    });

    Ok(handle)
}
