//! The relay engine.
//!
//! # Responsibilities
//! - Accept clients and pair each with a backend from the pool
//! - Relay bytes in both directions without dropping partial writes
//! - Tear pairs down symmetrically on EOF or error
//!
//! # Per-connection lifecycle
//! ```text
//! client:  AwaitingBackend ──backend connected──▶ Established
//! backend: Connecting ──────connected──────────▶ Established
//!                    └─────refused/error──▶ closed (client closed or retried)
//! either:  EOF ──▶ draining (both ends) ──buffers empty──▶ closed
//!          read/write error ──────────────────────────────▶ closed
//! ```
//!
//! # Backpressure
//! Bytes read from `d` are queued on `peer(d)` and flushed until the socket
//! would block. While anything is queued on the peer, reads from `d` are
//! paused and the peer carries write interest; once drained, write interest
//! is dropped and `d` resumes reading.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::TcpListener;
use mio::{Interest, Token};
use slab::Slab;

use crate::config::RelayConfig;
use crate::load_balancer::BackendPool;
use crate::net::connection::{ConnectProgress, Connection, ConnectionState};
use crate::net::listener;
use crate::observability::metrics;
use crate::relay::buffer::{Flush, OutboundBuffer};
use crate::relay::error::RelayError;
use crate::relay::multiplexer::{Multiplexer, Readiness};
use crate::relay::registry::ConnectionRegistry;

const LISTENER: Token = Token(usize::MAX);

/// Delay before the listener is retried after a failed accept (e.g. EMFILE).
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Single-threaded accept/connect/relay loop.
///
/// Owns the listener, poller, pool, registry and every connection. Nothing
/// here is shared with another thread.
#[derive(Debug)]
pub struct RelayEngine {
    listener: TcpListener,
    local_addr: SocketAddr,
    poller: Multiplexer,
    pool: BackendPool,
    registry: ConnectionRegistry,
    connections: Slab<Connection>,
    read_buf: Vec<u8>,
    batch: Vec<Readiness>,
    retry_next_backend: bool,
    /// Set after a failed accept; the listener is re-reported once it passes.
    accept_retry_at: Option<Instant>,
}

impl RelayEngine {
    /// Take ownership of a bound listener and start tracking it.
    pub fn new(mut listener: TcpListener, pool: BackendPool, config: &RelayConfig) -> Result<Self, RelayError> {
        let poller = Multiplexer::new(config.max_events)?;
        poller.register(&mut listener, LISTENER, Interest::READABLE)?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            poller,
            pool,
            registry: ConnectionRegistry::new(),
            connections: Slab::new(),
            read_buf: vec![0; config.buffer_size],
            batch: Vec::with_capacity(config.max_events),
            retry_next_backend: config.retry_next_backend,
            accept_retry_at: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Connections currently owned by the loop (both roles).
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Run until the poller itself fails.
    pub fn run(&mut self) -> Result<(), RelayError> {
        tracing::info!(
            address = %self.local_addr,
            backends = self.pool.len(),
            retry_next_backend = self.retry_next_backend,
            "Relay loop started"
        );
        loop {
            self.turn(None)?;
        }
    }

    /// Wait for one batch of readiness (at most `timeout`) and process it in order.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<(), RelayError> {
        let timeout = self.rearm_listener(timeout);
        let mut batch = std::mem::take(&mut self.batch);
        self.poller.wait(&mut batch, timeout)?;

        for &readiness in &batch {
            if readiness.token == LISTENER {
                self.accept_client();
            } else {
                self.handle_event(readiness);
            }
        }

        self.batch = batch;
        Ok(())
    }

    fn accept_client(&mut self) {
        let (stream, addr) = match listener::accept_client(&self.listener) {
            Ok(Some(accepted)) => accepted,
            Ok(None) => return,
            Err(e) => {
                self.on_accept_failed(e);
                return;
            }
        };
        // One client per event; anything still queued is picked up next turn
        self.poller.carry(LISTENER, true, false);
        self.accept_retry_at = None;
        metrics::record_client_accepted();

        let mut client = Connection::client(stream, addr);
        let entry = self.connections.vacant_entry();
        let token = Token(entry.key());
        if let Err(e) = self.poller.register(&mut client.stream, token, Interest::READABLE) {
            tracing::warn!(client = %addr, error = %e, "Failed to register client, dropping it");
            return;
        }

        tracing::debug!(connection_id = %client.id, client = %addr, "Client accepted");
        entry.insert(client);
        self.connect_backend(token, OutboundBuffer::new());
    }

    /// The backlog may still hold clients, but mio will not report the
    /// listener again until a new one arrives. Retry after a short delay.
    fn on_accept_failed(&mut self, error: io::Error) {
        tracing::warn!(error = %error, "Failed to accept client connection");
        metrics::record_accept_error();
        self.accept_retry_at = Some(Instant::now() + ACCEPT_RETRY_DELAY);
    }

    /// Carry the listener once a pending accept retry is due. Until then, cap
    /// `timeout` so the wait wakes up in time.
    fn rearm_listener(&mut self, timeout: Option<Duration>) -> Option<Duration> {
        let Some(retry_at) = self.accept_retry_at else {
            return timeout;
        };
        let now = Instant::now();
        if now >= retry_at {
            self.accept_retry_at = None;
            self.poller.carry(LISTENER, true, false);
            return timeout;
        }
        let remaining = retry_at - now;
        Some(timeout.map_or(remaining, |t| t.min(remaining)))
    }

    /// Open a connection to the next backend for `client` and pair them.
    ///
    /// `queued` holds client bytes read before any backend was reachable.
    /// Closes the client once its attempts are used up.
    fn connect_backend(&mut self, client: Token, queued: OutboundBuffer) {
        let max_attempts = if self.retry_next_backend {
            self.pool.len()
        } else {
            1
        };

        loop {
            let Some(client_conn) = self.connections.get_mut(client.0) else {
                return;
            };
            if client_conn.connect_attempts >= max_attempts {
                tracing::warn!(
                    connection_id = %client_conn.id,
                    client = %client_conn.remote,
                    attempts = client_conn.connect_attempts,
                    "No backend reachable, closing client"
                );
                self.release(client);
                return;
            }
            client_conn.connect_attempts += 1;
            let client_id = client_conn.id;
            let draining = client_conn.draining;

            let backend = self.pool.next().clone();
            let mut conn = match Connection::connect_backend(backend.addr) {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %client_id,
                        backend = %backend,
                        error = %e,
                        "Backend connect failed"
                    );
                    metrics::record_backend_connect(backend.addr, "failed");
                    continue;
                }
            };

            let entry = self.connections.vacant_entry();
            let token = Token(entry.key());
            let interest = conn.desired_interest();
            if let Err(e) = self.poller.register(&mut conn.stream, token, interest) {
                tracing::warn!(
                    connection_id = %client_id,
                    backend = %backend,
                    error = %e,
                    "Failed to register backend connection"
                );
                metrics::record_backend_connect(backend.addr, "failed");
                continue;
            }
            conn.interest = interest;
            conn.draining = draining;
            let backend_id = conn.id;
            entry.insert(conn);

            if let Err(e) = self.registry.pair(client, token) {
                tracing::error!(
                    connection_id = %client_id,
                    error = %e,
                    "Failed to pair client with backend, dropping both"
                );
                self.release(token);
                self.release(client);
                return;
            }
            self.connections[token.0].outbound = queued;

            tracing::debug!(
                connection_id = %client_id,
                backend_connection_id = %backend_id,
                backend = %backend,
                "Backend connect issued"
            );
            metrics::set_active_pairs(self.registry.pairs());
            return;
        }
    }

    fn handle_event(&mut self, readiness: Readiness) {
        let token = readiness.token;
        let Some(conn) = self.connections.get(token.0) else {
            tracing::trace!(?token, "Event for released connection, ignoring");
            return;
        };
        let peer = match self.registry.peer_of(token) {
            Ok(peer) => peer,
            Err(e) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "Ignoring event for unpaired connection");
                return;
            }
        };

        let mut writable = readiness.writable;
        if conn.state == ConnectionState::Connecting {
            match conn.poll_connect() {
                ConnectProgress::Pending => return,
                ConnectProgress::Connected => {
                    self.on_backend_connected(token, peer);
                    writable = true;
                }
                ConnectProgress::Failed(e) => {
                    self.on_connect_failed(token, peer, e);
                    return;
                }
            }
        }

        if writable {
            self.flush(token, peer);
        }
        if readiness.readable {
            self.relay_from(token, peer);
        }
    }

    fn on_backend_connected(&mut self, backend: Token, client: Token) {
        if let Some(conn) = self.connections.get_mut(backend.0) {
            conn.state = ConnectionState::Established;
            tracing::info!(
                connection_id = %conn.id,
                backend = %conn.remote,
                "Backend connected"
            );
            metrics::record_backend_connect(conn.remote, "connected");
        }
        if let Some(conn) = self.connections.get_mut(client.0) {
            conn.state = ConnectionState::Established;
        }
    }

    fn on_connect_failed(&mut self, backend: Token, client: Token, error: io::Error) {
        self.registry.unpair(backend);

        let queued = match self.connections.try_remove(backend.0) {
            Some(mut conn) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    backend = %conn.remote,
                    error = %error,
                    "Backend connect failed"
                );
                metrics::record_backend_connect(conn.remote, "failed");
                let queued = conn.outbound.take();
                conn.release(&mut self.poller, backend);
                queued
            }
            None => OutboundBuffer::new(),
        };

        metrics::set_active_pairs(self.registry.pairs());
        self.connect_backend(client, queued);
    }

    /// Read one chunk from `token` and queue it on `peer`.
    fn relay_from(&mut self, token: Token, peer: Token) {
        if !self.registry.contains(token) {
            return;
        }
        let Some(conn) = self.connections.get_mut(token.0) else {
            return;
        };
        if conn.reading_paused || conn.draining {
            return;
        }

        let role = conn.role;
        match conn.stream.read(&mut self.read_buf) {
            Ok(0) => self.begin_drain(token, peer),
            Ok(n) => {
                metrics::record_bytes_relayed(role.upstream_label(), n);
                // More data or a FIN may sit behind this chunk; keep reading until would-block
                self.poller.carry(token, true, false);
                let Some(peer_conn) = self.connections.get_mut(peer.0) else {
                    return;
                };
                peer_conn.outbound.push(&self.read_buf[..n]);
                self.flush(peer, token);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                self.poller.carry(token, true, false);
            }
            Err(e) => {
                tracing::debug!(?token, role = ?role, error = %e, "Read failed, closing pair");
                self.teardown(token);
            }
        }
    }

    /// Write as much of `token`'s queue as the socket takes. `source` is the
    /// peer whose reads feed the queue.
    fn flush(&mut self, token: Token, source: Token) {
        let Some(conn) = self.connections.get_mut(token.0) else {
            return;
        };
        if conn.state == ConnectionState::Connecting {
            if !conn.outbound.is_empty() {
                self.pause_reading(source);
            }
            return;
        }

        match conn.outbound.flush_to(&mut conn.stream) {
            Ok((_, Flush::Drained)) => {
                if conn.draining && self.pair_drained(token, source) {
                    self.teardown(token);
                    return;
                }
                if self.sync_interest(token) {
                    self.resume_reading(source);
                }
            }
            Ok((_, Flush::Blocked)) => {
                if self.sync_interest(token) {
                    self.pause_reading(source);
                }
            }
            Err(e) => {
                tracing::debug!(?token, error = %e, "Write failed, closing pair");
                self.teardown(token);
            }
        }
    }

    /// Re-register `token` if its interest changed. Returns false if the pair was torn down.
    fn sync_interest(&mut self, token: Token) -> bool {
        let Some(conn) = self.connections.get_mut(token.0) else {
            return false;
        };
        let desired = conn.desired_interest();
        if desired == conn.interest {
            return true;
        }
        match self.poller.reregister(&mut conn.stream, token, desired) {
            Ok(()) => {
                conn.interest = desired;
                true
            }
            Err(e) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to update interest, closing pair");
                self.teardown(token);
                false
            }
        }
    }

    fn pause_reading(&mut self, token: Token) {
        if let Some(conn) = self.connections.get_mut(token.0) {
            conn.reading_paused = true;
        }
    }

    fn resume_reading(&mut self, token: Token) {
        if let Some(conn) = self.connections.get_mut(token.0) {
            if conn.reading_paused {
                conn.reading_paused = false;
                // The edge may have fired while paused
                self.poller.carry(token, true, false);
            }
        }
    }

    /// EOF on `token`: stop reading both ends, close once nothing is queued.
    fn begin_drain(&mut self, token: Token, peer: Token) {
        for t in [token, peer] {
            if let Some(conn) = self.connections.get_mut(t.0) {
                conn.draining = true;
            }
        }
        tracing::debug!(?token, ?peer, "Peer closed, draining pair");

        if self.pair_drained(token, peer) {
            self.teardown(token);
        }
    }

    fn pair_drained(&self, a: Token, b: Token) -> bool {
        [a, b].iter().all(|t| {
            self.connections.get(t.0).map_or(true, |conn| {
                conn.outbound.is_empty() && conn.state != ConnectionState::Connecting
            })
        })
    }

    /// Close and deregister both ends of `token`'s pair and forget the pairing.
    fn teardown(&mut self, token: Token) {
        let peer = self.registry.unpair(token);
        for t in std::iter::once(token).chain(peer) {
            self.release(t);
        }
        metrics::record_pair_closed();
        metrics::set_active_pairs(self.registry.pairs());
        tracing::debug!(?token, ?peer, active_pairs = self.registry.pairs(), "Pair closed");
    }

    fn release(&mut self, token: Token) {
        if let Some(conn) = self.connections.try_remove(token.0) {
            conn.release(&mut self.poller, token);
        }
    }
}
