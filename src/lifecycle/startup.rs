//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the final configuration (after CLI overrides)
//! - Resolve the backend pool
//! - Bind the listener and hand everything to the relay engine

use std::net::IpAddr;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{BalancerConfig, ConfigError};
use crate::load_balancer::BackendPool;
use crate::net::listener::{bind_listener, ListenerError};
use crate::relay::{RelayEngine, RelayError};

/// Fatal errors raised before the loop starts.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to initialize event loop: {0}")]
    Relay(#[from] RelayError),
}

/// Build a ready-to-run engine listening on `bind_address:port`.
pub fn build_engine(config: &BalancerConfig, port: u16) -> Result<RelayEngine, StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let pool = BackendPool::from_config(&config.backends)?;
    for backend in pool.backends() {
        tracing::info!(backend = %backend, addr = %backend.addr, "Backend configured");
    }

    let ip: IpAddr = config.listener.bind_address.parse().map_err(|_| {
        ConfigError::Validation(vec![ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        )])
    })?;
    let listener = bind_listener(ip, port)?;

    Ok(RelayEngine::new(listener, pool, &config.relay)?)
}
