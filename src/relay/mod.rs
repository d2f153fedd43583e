//! Relay subsystem: the single-threaded event loop and the state it owns.
//!
//! # Data Flow
//! ```text
//! multiplexer.rs wait()
//!     → listener ready: accept client, BackendPool::next, non-blocking connect
//!         → registry.rs pair(client, backend), register both
//!     → connection ready: read a chunk
//!         → buffer.rs queue on the peer, flush until would-block
//!         → write interest / paused reads while bytes are queued
//!     → EOF or error: unpair, deregister, close both ends
//! ```
//!
//! # Design Decisions
//! - One thread owns everything; the only suspension point is `wait`
//! - Level-triggered contract on top of mio's edge-triggered readiness
//! - Partial writes are queued, never dropped
//! - Per-pair failures never stop the loop

pub mod buffer;
pub mod error;
pub mod event_loop;
pub mod multiplexer;
pub mod registry;

pub use error::RelayError;
pub use event_loop::RelayEngine;
pub use registry::ConnectionRegistry;
