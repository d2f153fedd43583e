//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay engine and startup produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (connection id, client, backend)
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
