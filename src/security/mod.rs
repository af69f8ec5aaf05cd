//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (origin allow-list, preflight answers)
//!     → client_key.rs (resolve client identity)
//!     → rate_limit.rs (per-client admission check)
//!     → headers.rs (add X-Forwarded-For, harden responses)
//!     → Forward upstream
//! ```
//!
//! # Design Decisions
//! - One global limit per client key
//! - Unidentifiable clients share a single bucket
//! - Denials are final for the request; nothing is retried

pub mod client_key;
pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use client_key::{client_key, UNKNOWN_CLIENT};
pub use rate_limit::{Decision, RateLimitEntry, RateLimitExceeded, RateLimiter};
