//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.agent.model.trim().is_empty() {
        errors.push("agent.model must not be empty".to_string());
    }
    if config.agent.max_iterations == 0 {
        errors.push("agent.max_iterations must be > 0".to_string());
    }
    if config.agent.max_tokens == 0 {
        errors.push("agent.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.agent.temperature) {
        errors.push("agent.temperature must be in [0.0, 2.0]".to_string());
    }
    if config.provider.api_base.trim().is_empty() {
        errors.push("provider.api_base must not be empty".to_string());
    }
    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.telegram.enabled && config.telegram.token.trim().is_empty() {
        errors.push("telegram.token is required when telegram is enabled".to_string());
    }
    if config.telegram.max_history == 0 {
        errors.push("telegram.max_history must be > 0".to_string());
    }
    if config.tools.exec.timeout_secs == 0 {
        errors.push("tools.exec.timeout_secs must be > 0".to_string());
    }
    if config.tools.browser.enabled && config.tools.browser.endpoint.trim().is_empty() {
        errors.push("tools.browser.endpoint is required when browser is enabled".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_errors_are_aggregated() {
        let mut config = Config::default();
        config.agent.temperature = 3.0;
        config.telegram.enabled = true;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("agent.temperature"));
        assert!(err.contains("telegram.token"));
    }
}
