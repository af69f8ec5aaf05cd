//! Per-client admission gateway.
//!
//! An HTTP front door that enforces a fixed-window request limit per client
//! before forwarding traffic to the application backend.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use security::{Decision, RateLimiter};
