//! Admission guard middleware.
//!
//! Resolves the client key, records the request with the shared limiter and
//! either passes the request on or answers `429 Too Many Requests`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::observability::metrics;
use crate::security::{client_key, RateLimiter};

/// State shared by every invocation of the middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trust_forwarded_for: bool,
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer, state.trust_forwarded_for);

    match state.limiter.check(&key).into_result() {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id(request.headers()),
                client = %key,
                retry_after_secs = rejection.retry_after_secs,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited();
            rejection.into_response()
        }
    }
}

