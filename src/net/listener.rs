//! TCP listener setup.
//!
//! # Responsibilities
//! - Bind the configured address non-blocking, with address reuse
//! - Accept clients without ever parking the loop thread

use std::io;
use std::net::{IpAddr, SocketAddr};

use mio::net::{TcpListener, TcpStream};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Bind a non-blocking listener on `ip:port`.
///
/// mio sets `SO_REUSEADDR` on Unix and listens with a backlog of 1024.
pub fn bind_listener(ip: IpAddr, port: u16) -> Result<TcpListener, ListenerError> {
    let addr = SocketAddr::new(ip, port);
    let listener = TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(addr),
        "Listener bound"
    );

    Ok(listener)
}

/// Accept one pending client. `Ok(None)` means nothing is waiting.
///
/// Accepted streams are already non-blocking.
pub fn accept_client(listener: &TcpListener) -> io::Result<Option<(TcpStream, SocketAddr)>> {
    loop {
        match listener.accept() {
            Ok(accepted) => return Ok(Some(accepted)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
