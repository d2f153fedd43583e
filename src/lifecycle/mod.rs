//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Resolve backends → Bind listener → Build engine
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last, after the backend pool is known good
//! - No shutdown path; the process runs until killed

pub mod startup;

pub use startup::{build_engine, StartupError};
