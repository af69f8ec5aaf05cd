//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and timeouts > 0)
//! - Validate that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::uri::Authority;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("rate_limit.limit must be greater than 0")]
    ZeroLimit,
    #[error("rate_limit.window_ms must be greater than 0")]
    ZeroWindow,
    #[error("{field}: invalid address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("timeouts.request_secs must be greater than 0")]
    ZeroRequestTimeout,
    #[error("security.max_body_size must be greater than 0")]
    ZeroBodySize,
    #[error("cors.allowed_origins contains an empty entry")]
    EmptyOrigin,
    #[error("cors.allowed_origins cannot contain '*' when credentials are allowed")]
    WildcardOrigin,
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.limit == 0 {
        errors.push(ValidationError::ZeroLimit);
    }
    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "upstream.address",
            value: config.upstream.address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodySize);
    }
    if config.cors.allowed_origins.iter().any(|o| o.trim().is_empty()) {
        errors.push(ValidationError::EmptyOrigin);
    }
    if config.cors.allowed_origins.iter().any(|o| o.trim() == "*") {
        errors.push(ValidationError::WildcardOrigin);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
