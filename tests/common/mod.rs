//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use transcript_proxy::config::ProxyConfig;
use transcript_proxy::lifecycle::Shutdown;
use transcript_proxy::transport::{CapturePolicy, MemorySink, SequenceCounter};
use transcript_proxy::HttpServer;

/// A running proxy plus the handles tests inspect.
#[allow(dead_code)]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub sink: MemorySink,
    pub counter: SequenceCounter,
    pub shutdown: Shutdown,
}

/// Start a proxy forwarding to `target`, recording transcripts in memory.
#[allow(dead_code)]
pub async fn start_proxy(target: &str, policy: CapturePolicy) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.target = target.to_string();
    config.transcript.on_capture_error = policy;

    let sink = MemorySink::new();
    let server = HttpServer::with_sink(config, Arc::new(sink.clone())).unwrap();
    let counter = server.counter().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        sink,
        counter,
        shutdown,
    }
}

/// Client that opens a fresh connection per request.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Read one request (head plus `Content-Length` body) off the socket.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + body_len {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    buf
}

/// Start a backend answering every request with `headers` and `body`.
///
/// `headers` are extra header lines; `Content-Length` is always added.
#[allow(dead_code)]
pub async fn start_raw_backend(headers: &'static [&'static str], body: Vec<u8>) -> SocketAddr {
    let body = Arc::new(body);
    start_programmable_backend(move |_request| {
        let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n", body.len())
            .into_bytes();
        for line in headers {
            response.extend_from_slice(line.as_bytes());
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"\r\n");
        response.extend_from_slice(&body);
        response
    })
    .await
}

/// Start a backend whose response body is the raw request it received.
#[allow(dead_code)]
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|request| {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            request.len()
        )
        .into_bytes();
        response.extend_from_slice(&request);
        response
    })
    .await
}

/// Start a backend that builds each raw response from the raw request.
pub async fn start_programmable_backend<F>(f: F) -> SocketAddr
where
    F: Fn(Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = read_request(&mut socket).await;
                        let response = f(request);
                        let _ = socket.write_all(&response).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
