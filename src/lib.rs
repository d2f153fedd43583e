//! TCP load balancer library.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::schema::BalancerConfig;
pub use lifecycle::build_engine;
pub use relay::RelayEngine;
