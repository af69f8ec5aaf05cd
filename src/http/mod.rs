//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → request.rs (assign / propagate request id)
//!     → middleware/rate_limit.rs (admission guard)
//!     → server.rs forward_handler (rewrite URI, forward upstream)
//!     → Send upstream response to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
