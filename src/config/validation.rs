//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, buffer sizes, batch size)
//! - Validate addresses and log level before anything is bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs after CLI overrides, before config is accepted into the system

use std::net::IpAddr;

use crate::config::schema::BalancerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not an IP address")]
    InvalidBindAddress(String),

    #[error("at least one backend is required")]
    NoBackends,

    #[error("backend #{0} has an empty host")]
    EmptyBackendHost(usize),

    #[error("backend #{0} has port 0")]
    InvalidBackendPort(usize),

    #[error("relay.buffer_size must be greater than 0")]
    ZeroBufferSize,

    #[error("relay.max_events must be greater than 0")]
    ZeroMaxEvents,

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for (i, backend) in config.backends.iter().enumerate() {
        if backend.host.trim().is_empty() {
            errors.push(ValidationError::EmptyBackendHost(i));
        }
        if backend.port == 0 {
            errors.push(ValidationError::InvalidBackendPort(i));
        }
    }

    if config.relay.buffer_size == 0 {
        errors.push(ValidationError::ZeroBufferSize);
    }
    if config.relay.max_events == 0 {
        errors.push(ValidationError::ZeroMaxEvents);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&BalancerConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = BalancerConfig::default();
        config.listener.bind_address = "not-an-ip".into();
        config.backends = vec![BackendConfig::new("", 0)];
        config.relay.buffer_size = 0;
        config.relay.max_events = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBindAddress("not-an-ip".into()),
                ValidationError::EmptyBackendHost(0),
                ValidationError::InvalidBackendPort(0),
                ValidationError::ZeroBufferSize,
                ValidationError::ZeroMaxEvents,
                ValidationError::InvalidLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn empty_pool_is_rejected() {
        let mut config = BalancerConfig::default();
        config.backends.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoBackends]));
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let mut config = BalancerConfig::default();
        config.observability.log_level = "DEBUG".into();
        assert_eq!(validate_config(&config), Ok(()));
    }
}
