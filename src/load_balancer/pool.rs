//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the fixed, ordered list of backends
//! - Hand out backends in strict rotation

use crate::config::{BackendConfig, ConfigError};
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin};

/// Fixed, non-empty backend list with a rotating selection cursor.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Backend>,
    cursor: RoundRobin,
}

impl BackendPool {
    /// Build a pool. An empty list is a configuration error.
    pub fn new(backends: Vec<Backend>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::EmptyBackendPool);
        }
        let cursor = RoundRobin::new(backends.len());
        Ok(Self { backends, cursor })
    }

    /// Resolve every configured backend and build a pool from them.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self, ConfigError> {
        let backends = configs
            .iter()
            .map(Backend::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        for backend in &backends {
            tracing::debug!(backend = %backend, addr = %backend.addr, "Backend resolved");
        }

        Self::new(backends)
    }

    /// Select the backend at the cursor and advance it.
    pub fn next(&mut self) -> &Backend {
        let index = self.cursor.advance();
        &self.backends[index]
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }
}
