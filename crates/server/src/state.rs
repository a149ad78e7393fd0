use std::sync::Arc;

use marquee_core::{Config, JobScheduler, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<JobScheduler>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<JobScheduler>) -> Self {
        Self { config, scheduler }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &JobScheduler {
        self.scheduler.as_ref()
    }
}
