use std::sync::Arc;
use remediator_core::{Config, RemediationOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<RemediationOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<RemediationOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &RemediationOrchestrator {
        self.orchestrator.as_ref()
    }
}
