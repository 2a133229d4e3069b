use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration beyond what serde enforces:
/// - server port is not 0
/// - api_key is present and non-empty when method = "api_key"
/// - queue urls/subject/stream are non-empty
/// - orchestrator limits are sane
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && !config
            .auth
            .api_key
            .as_ref()
            .is_some_and(|key| !key.is_empty())
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.queue.urls.is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.urls cannot be empty".to_string(),
        ));
    }

    if config.queue.subject.is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.subject cannot be empty".to_string(),
        ));
    }

    if config.queue.stream.is_empty() {
        return Err(ConfigError::ValidationError(
            "queue.stream cannot be empty".to_string(),
        ));
    }

    if config.orchestrator.event_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.event_capacity cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.max_document_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_document_bytes cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AuthConfig, DatabaseConfig, ObjectStoreConfig, QueueConfig, ServerConfig,
    };
    use crate::orchestrator::OrchestratorConfig;

    fn base_config() -> Config {
        Config {
            auth: AuthConfig {
                method: AuthMethod::None,
                api_key: None,
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            objects: ObjectStoreConfig::default(),
            queue: QueueConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_api_key_required() {
        let mut config = base_config();
        config.auth.method = AuthMethod::ApiKey;
        assert!(validate_config(&config).is_err());

        config.auth.api_key = Some("".to_string());
        assert!(validate_config(&config).is_err());

        config.auth.api_key = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_queue_fields() {
        let mut config = base_config();
        config.queue.urls.clear();
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.queue.subject.clear();
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.queue.stream.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_orchestrator_limits() {
        let mut config = base_config();
        config.orchestrator.event_capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = base_config();
        config.orchestrator.max_document_bytes = 0;
        assert!(validate_config(&config).is_err());
    }
}
