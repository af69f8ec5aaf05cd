//! Cross-origin allow-list.
//!
//! Requests without an `Origin` header (curl, server-to-server) are never
//! affected. Origins outside the list get no CORS headers, so browsers
//! block the response.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Origins allowed when neither the config file nor `CORS_ORIGINS` set any.
pub fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// Split a comma-separated origin list, dropping blank entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the CORS layer for the configured origins.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_trims_and_skips_blanks() {
        let parsed = parse_origins(" https://app.example.com, ,https://admin.example.com ");
        assert_eq!(parsed, vec!["https://app.example.com", "https://admin.example.com"]);
    }

    #[test]
    fn test_default_origins() {
        assert_eq!(default_origins().len(), 2);
        assert!(default_origins().contains(&"http://localhost:5173".to_string()));
    }
}
