//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (non-blocking bind/listen, accept)
//!     → connection.rs (Connection handle, role, state, outbound buffer)
//!     → connection.rs (non-blocking outbound connect to the chosen backend)
//!     → Hand both ends to the relay engine
//!
//! Connection States:
//!     AwaitingBackend (client) / Connecting (backend) → Established → Closed
//!     EOF on either end marks the pair draining until queued bytes are written
//! ```
//!
//! # Design Decisions
//! - Every socket is non-blocking from creation
//! - A Connection owns its socket; releasing it deregisters and closes in one step

pub mod connection;
pub mod listener;
