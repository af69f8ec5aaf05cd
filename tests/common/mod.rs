//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use admission_gateway::config::GatewayConfig;
use admission_gateway::http::HttpServer;
use admission_gateway::lifecycle::Shutdown;
use admission_gateway::security::RateLimiter;

/// Start a backend that answers every request with 200 and a body holding
/// the `x-forwarded-for` header it received (empty when absent).
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                                break;
                            }
                        }
                    }
                }

                let head = String::from_utf8_lossy(&buf[..read]);
                let forwarded = head
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("x-forwarded-for").then(|| value.trim().to_string())
                    })
                    .unwrap_or_default();

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    forwarded.len(),
                    forwarded
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Gateway config pointing at `upstream` with the given limits.
pub fn gateway_config(upstream: SocketAddr, limit: u64, window_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = upstream.to_string();
    config.rate_limit.limit = limit;
    config.rate_limit.window_ms = window_ms;
    config
}

/// Run a gateway on an ephemeral port. Returns its address and the
/// coordinator that stops it.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let (addr, shutdown, _) = start_gateway_with_limiter(config).await;
    (addr, shutdown)
}

/// Like [`start_gateway`], also handing back the gateway's limiter.
#[allow(dead_code)]
pub async fn start_gateway_with_limiter(config: GatewayConfig) -> (SocketAddr, Shutdown, Arc<RateLimiter>) {
    let server = HttpServer::new(config).unwrap();
    let limiter = server.limiter();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown: broadcast::Receiver<()> = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (addr, shutdown, limiter)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
