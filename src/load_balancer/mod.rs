//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client accepted by the event loop
//!     → pool.rs (BackendPool::next)
//!     → round_robin.rs (rotate the cursor, wrap at the end)
//!     → backend.rs (pre-resolved socket address to connect to)
//! ```
//!
//! # Design Decisions
//! - Pool is fixed at startup and never mutated
//! - Pure rotation: no health, load, or latency input
//! - Hostnames resolved once, so selection never blocks the loop
//! - Owned by the single event loop thread; no atomics or locks

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use pool::BackendPool;
