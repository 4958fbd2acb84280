use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Secret auth has a non-empty secret
/// - Retention windows are ordered and pages are non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::Secret
        && config.auth.secret.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.secret must be set when auth.method = \"secret\"".to_string(),
        ));
    }

    if config.retention.page_size == 0 {
        return Err(ConfigError::ValidationError(
            "retention.page_size cannot be 0".to_string(),
        ));
    }

    if config.retention.hard_expiry_months < config.retention.idle_months {
        return Err(ConfigError::ValidationError(format!(
            "retention.hard_expiry_months ({}) must not be shorter than retention.idle_months ({})",
            config.retention.hard_expiry_months, config.retention.idle_months
        )));
    }

    Ok(())
}
