//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tcp_balancer::config::RelayConfig;
use tcp_balancer::load_balancer::{Backend, BackendPool};
use tcp_balancer::net::listener::bind_listener;
use tcp_balancer::RelayEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Start a balancer on an ephemeral port, running on its own thread.
pub fn spawn_balancer(backends: &[SocketAddr], config: RelayConfig) -> SocketAddr {
    let listener = bind_listener("127.0.0.1".parse().unwrap(), 0).unwrap();
    let pool = BackendPool::new(backends.iter().map(|a| Backend::new(*a)).collect()).unwrap();
    let mut engine = RelayEngine::new(listener, pool, &config).unwrap();
    let addr = engine.local_addr();

    std::thread::spawn(move || {
        let _ = engine.run();
    });

    addr
}

/// Start a backend that echoes everything it receives.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let (mut reader, mut writer) = socket.split();
                        let _ = tokio::io::copy(&mut reader, &mut writer).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that greets each connection with `tag` and then echoes.
pub async fn start_tagged_backend(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        if socket.write_all(tag.as_bytes()).await.is_err() {
                            return;
                        }
                        let (mut reader, mut writer) = socket.split();
                        let _ = tokio::io::copy(&mut reader, &mut writer).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that waits `delay` before reading one connection to EOF.
/// The collected bytes are sent on the returned channel.
pub async fn start_slow_sink_backend(delay: Duration) -> (SocketAddr, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            tokio::time::sleep(delay).await;
            let mut received = Vec::new();
            let _ = socket.read_to_end(&mut received).await;
            let _ = tx.send(received);
        }
    });

    (addr, rx)
}

/// Start a backend that sends `farewell` and closes each connection.
pub async fn start_closing_backend(farewell: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(farewell).await;
            let _ = socket.shutdown().await;
        }
    });

    addr
}

/// An address nothing is listening on.
pub fn closed_port() -> SocketAddr {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
}

/// Deterministic, non-repeating-looking payload.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 31 + seed as usize) % 251) as u8)
        .collect()
}
