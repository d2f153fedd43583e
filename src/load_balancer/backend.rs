//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Resolve its address once, at pool construction

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use crate::config::{BackendConfig, ConfigError};

/// A single backend server. Immutable for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Host as configured.
    pub host: String,
    /// Port as configured.
    pub port: u16,
    /// Resolved address the event loop connects to.
    pub addr: SocketAddr,
}

impl Backend {
    /// Create a backend from an already-resolved address.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            addr,
        }
    }

    /// Resolve a configured backend. The first address returned by the resolver wins.
    pub fn resolve(config: &BackendConfig) -> Result<Self, ConfigError> {
        let resolve_err = |reason: String| ConfigError::Resolve {
            host: config.host.clone(),
            port: config.port,
            reason,
        };

        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| resolve_err(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_err("no addresses returned".to_string()))?;

        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            addr,
        })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ip_literal() {
        let backend = Backend::resolve(&BackendConfig::new("127.0.0.1", 9001)).unwrap();
        assert_eq!(backend.addr, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(backend.to_string(), "127.0.0.1:9001");
    }

    #[test]
    fn keeps_configured_host_for_display() {
        let backend = Backend::resolve(&BackendConfig::new("localhost", 9002)).unwrap();
        assert_eq!(backend.host, "localhost");
        assert_eq!(backend.addr.port(), 9002);
        assert!(backend.addr.ip().is_loopback());
    }

    #[test]
    fn unresolvable_host_is_config_error() {
        let err = Backend::resolve(&BackendConfig::new("no such host!", 1)).unwrap_err();
        assert!(matches!(err, ConfigError::Resolve { port: 1, .. }));
    }
}
