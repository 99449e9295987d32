//! Application options

use std::time::Duration;

use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub settings: Settings,

    pub lifecycle: LifecycleOptions,
}

impl AppOptions {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            lifecycle: LifecycleOptions::default(),
        }
    }
}

/// Lifecycle options for the server
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown. In-flight deploys past this
    /// are dropped, which kills their build processes.
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}
