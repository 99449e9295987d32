//! Shared fixtures: an orchestrator wired to in-memory collaborators

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use api_models::{DeployConfig, ServiceConfig};
use pare_server::app::state::{AppState, Providers};
use pare_server::build::runner::ScriptedRunner;
use pare_server::deploy::DeploymentOrchestrator;
use pare_server::filesys::dir::Dir;
use pare_server::function::memory::MemoryFunctions;
use pare_server::models::User;
use pare_server::packaging::zip_dirs;
use pare_server::registry::memory::MemoryRegistry;
use pare_server::storage::memory::MemoryStore;
use pare_server::storage::settings::Settings;

pub const API_KEY: &str = "alice-key";

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.cloud.account_id = "123456789012".to_string();
    settings.cloud.lambda_role_arn = "arn:aws:iam::123456789012:role/pare".to_string();
    settings.publish.initial_backoff_ms = 1;
    settings.publish.max_retries = 3;
    settings.orchestrator.max_concurrent_pipelines = 4;
    settings
}

pub struct Harness {
    pub settings: Settings,
    pub store: Arc<MemoryStore>,
    pub registry: Arc<MemoryRegistry>,
    pub functions: Arc<MemoryFunctions>,
    pub runner: Arc<ScriptedRunner>,
    pub state: AppState,
    pub user: User,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(test_settings())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user("alice", API_KEY).unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let functions = Arc::new(MemoryFunctions::new());
        let runner = Arc::new(ScriptedRunner::new());

        let providers = Providers {
            registry: registry.clone(),
            functions: functions.clone(),
            runner: runner.clone(),
        };
        let state = AppState::with_parts(&settings, store.clone(), providers);

        Self {
            settings,
            store,
            registry,
            functions,
            runner,
            state,
            user,
        }
    }

    pub fn orchestrator(&self) -> &DeploymentOrchestrator {
        &self.state.orchestrator
    }
}

pub fn service(name: &str) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        path: format!("app.{}:handler", name.replace('-', "_")),
        requirements: vec!["requests".to_string()],
    }
}

pub fn deploy_config(git_hash: &str, names: &[&str]) -> DeployConfig {
    DeployConfig {
        git_hash: git_hash.to_string(),
        python_version: "3.12".to_string(),
        environment_variables: BTreeMap::from([("STAGE".to_string(), "test".to_string())]),
        services: names.iter().map(|name| service(name)).collect(),
    }
}

/// Zip bytes of a small bundle with an `app` package
pub async fn bundle_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let root = Dir::new(dir.path());
    root.file("app/__init__.py").write_string("").await.unwrap();
    root.file("app/api.py")
        .write_string("def handler(event, context):\n    return event\n")
        .await
        .unwrap();
    zip_dirs(&[root]).await.unwrap()
}
