//! Finite state machine for one service pipeline

use serde::{Deserialize, Serialize};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started
    Pending,

    /// Building and pushing the image, or packaging the zip
    Building,

    /// Creating the repository and rewriting its pull policy
    EnsuringRepository,

    /// Creating or updating the function
    Publishing,

    /// Writing the service row
    Recording,

    /// Function live and recorded
    Deployed,

    Failed,
}

impl PipelineState {
    /// Stage name used in structured logs
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Pending => "pending",
            PipelineState::Building => "build",
            PipelineState::EnsuringRepository => "registry",
            PipelineState::Publishing => "publish",
            PipelineState::Recording => "record",
            PipelineState::Deployed => "deployed",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Deployed | PipelineState::Failed)
    }
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Start an image pipeline. The repository must exist before the push.
    Start,

    /// Start a zip pipeline, which needs no repository
    StartPackage,

    RepositoryReady,

    /// Image pushed or zip package assembled
    Built,

    Published,

    Recorded,

    Fail(String),
}

/// Pipeline FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    error: Option<String>,
    /// State in which the failure happened
    failed_in: Option<PipelineState>,
}

impl PipelineFsm {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            error: None,
            failed_in: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn failed_in(&self) -> Option<PipelineState> {
        self.failed_in
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            (PipelineState::Pending, PipelineEvent::Start) => PipelineState::EnsuringRepository,
            (PipelineState::Pending, PipelineEvent::StartPackage) => PipelineState::Building,

            (PipelineState::EnsuringRepository, PipelineEvent::RepositoryReady) => {
                PipelineState::Building
            }

            (PipelineState::Building, PipelineEvent::Built) => PipelineState::Publishing,

            (PipelineState::Publishing, PipelineEvent::Published) => PipelineState::Recording,

            (PipelineState::Recording, PipelineEvent::Recorded) => PipelineState::Deployed,

            (state, PipelineEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                self.failed_in = Some(state);
                PipelineState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
