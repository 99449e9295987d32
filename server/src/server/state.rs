//! Server state

use std::sync::Arc;

use crate::deploy::DeploymentOrchestrator;
use crate::function::FunctionProvider;
use crate::storage::settings::AuthSettings;
use crate::storage::DeploymentStore;

/// Server state shared across handlers
pub struct ServerState {
    pub auth: AuthSettings,
    pub store: Arc<dyn DeploymentStore>,
    pub orchestrator: Arc<DeploymentOrchestrator>,
    pub functions: Arc<dyn FunctionProvider>,
}

impl ServerState {
    pub fn new(
        auth: AuthSettings,
        orchestrator: Arc<DeploymentOrchestrator>,
        functions: Arc<dyn FunctionProvider>,
    ) -> Self {
        Self {
            auth,
            store: orchestrator.store().clone(),
            orchestrator,
            functions,
        }
    }
}
