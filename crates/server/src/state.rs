use std::sync::Arc;

use scrivano_core::{Authenticator, Config, SanitizedConfig, TaskOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    orchestrator: Arc<TaskOrchestrator>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        orchestrator: Arc<TaskOrchestrator>,
    ) -> Self {
        Self {
            config,
            authenticator,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }
}
