//! Deployment of declared services as functions

pub mod fsm;
pub mod naming;
pub mod orchestrator;
pub mod pipeline;

pub use orchestrator::DeploymentOrchestrator;
pub use pipeline::{ArtifactBuilder, PipelineDeps};
