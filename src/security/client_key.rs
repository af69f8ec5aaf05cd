//! Client identity used as the rate limit key.
//!
//! Resolution order:
//! 1. first entry of `X-Forwarded-For`, trimmed (when trusted and non-empty)
//! 2. transport peer IP
//! 3. [`UNKNOWN_CLIENT`], a bucket shared by every unidentifiable caller

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Key for requests that carry no usable identity.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the rate limit key for a request.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(forwarded) = forwarded_client(headers) {
            return forwarded.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_CLIENT.to_string(),
    }
}

fn forwarded_client(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(xff: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(X_FORWARDED_FOR, HeaderValue::from_str(xff).unwrap());
        h
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.1:54321".parse().unwrap())
    }

    #[test]
    fn test_prefers_first_forwarded_entry() {
        let key = client_key(&headers("203.0.113.5, 10.0.0.1"), peer(), true);
        assert_eq!(key, "203.0.113.5");
    }

    #[test]
    fn test_trims_whitespace() {
        let key = client_key(&headers("   198.51.100.7  ,10.0.0.1"), peer(), true);
        assert_eq!(key, "198.51.100.7");
    }

    #[test]
    fn test_empty_forwarded_falls_back_to_peer_ip() {
        assert_eq!(client_key(&headers(""), peer(), true), "10.0.0.1");
        assert_eq!(client_key(&headers(" , 1.1.1.1"), peer(), true), "10.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), peer(), true), "10.0.0.1");
    }

    #[test]
    fn test_untrusted_forwarded_header_is_ignored() {
        let key = client_key(&headers("203.0.113.5"), peer(), false);
        assert_eq!(key, "10.0.0.1");
    }

    #[test]
    fn test_sentinel_when_nothing_identifies_client() {
        assert_eq!(client_key(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
        assert_eq!(client_key(&headers("203.0.113.5"), None, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_ipv6_peer() {
        let peer: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "2001:db8::1");
    }
}
