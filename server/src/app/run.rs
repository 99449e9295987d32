//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::ServerError;
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Run the deploy server until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    info!("Initializing Pare server...");

    let mut shutdown_manager = ShutdownManager::new(options.lifecycle.clone());

    let (server_stop_tx, server_stop_rx) = oneshot::channel::<()>();
    shutdown_manager.with_server_stop(server_stop_tx)?;

    let app_state = match AppState::init(&options.settings).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start server: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };

    let server_state = Arc::new(ServerState::new(
        options.settings.auth.clone(),
        app_state.orchestrator.clone(),
        app_state.functions.clone(),
    ));
    let handle = serve(&options.settings.server, server_state, async move {
        let _ = server_stop_rx.await;
    })
    .await?;
    shutdown_manager.with_server_handle(handle)?;

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");
    shutdown_manager.shutdown().await
}

struct ShutdownManager {
    lifecycle_options: LifecycleOptions,
    server_stop_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<Result<(), ServerError>>>,
}

impl ShutdownManager {
    pub fn new(lifecycle_options: LifecycleOptions) -> Self {
        Self {
            lifecycle_options,
            server_stop_tx: None,
            server_handle: None,
        }
    }

    pub fn with_server_stop(&mut self, stop_tx: oneshot::Sender<()>) -> Result<(), ServerError> {
        if self.server_stop_tx.is_some() {
            return Err(ServerError::Shutdown("server_stop already set".to_string()));
        }
        self.server_stop_tx = Some(stop_tx);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), ServerError>>,
    ) -> Result<(), ServerError> {
        if self.server_handle.is_some() {
            return Err(ServerError::Shutdown("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ServerError> {
        if let Some(stop_tx) = self.server_stop_tx.take() {
            let _ = stop_tx.send(());
        }

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, dropping in-flight requests",
                    self.lifecycle_options.max_shutdown_delay
                );
                if let Some(handle) = self.server_handle.take() {
                    handle.abort();
                }
                Err(ServerError::Shutdown("graceful shutdown timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ServerError> {
        info!("Shutting down Pare server...");

        if let Some(handle) = self.server_handle.as_mut() {
            handle
                .await
                .map_err(|e| ServerError::Shutdown(e.to_string()))??;
            self.server_handle = None;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
