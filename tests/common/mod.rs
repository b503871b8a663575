//! Shared fixture: a real server on an ephemeral port, plus a tiny client.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use switchyard::app::fetch::Fetch;
use switchyard::app::{self, AppState};
use switchyard::config::Config;
use switchyard::server::{DispatchPolicy, Dispatcher, Gate, Registry, Server, ShutdownHandle};
use tokio::runtime::Runtime;

/// Settings that keep the demo routes fast under test.
pub fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.server.listen_addr = "127.0.0.1:0".to_string();
    cfg.dispatch.deadline_ms = 2_000;
    cfg.handshake.poll_interval_ms = 100;
    cfg.handshake.process_delay_ms = 0;
    cfg.simulation.list_delay_ms = 0;
    cfg.simulation.long_operation_ms = 0;
    cfg
}

/// Answers from a fixed table keyed by URL; unknown URLs fail.
pub struct StubFetcher {
    pub replies: HashMap<String, (u16, String)>,
}

impl Fetch for StubFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<(u16, String)> {
        self.replies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused: {url}"))
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Option<Arc<AppState>>,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
    runtime: Option<Runtime>,
}

impl TestServer {
    /// Serves the demo routes.
    pub fn demo(cfg: Config, fetcher: Arc<dyn Fetch>) -> Self {
        let state = Arc::new(AppState::with_fetcher(&cfg, fetcher));
        let mut registry = Registry::new();
        app::register_routes(&mut registry, state.clone());
        let mut server = Self::with_registry(&cfg, registry, state.service_gate());
        server.state = Some(state);
        server
    }

    pub fn with_registry(cfg: &Config, registry: Registry, service: Gate) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(16)
            .enable_all()
            .build()
            .expect("runtime");

        let dispatcher = Dispatcher::new(
            runtime.handle().clone(),
            DispatchPolicy::from(&cfg.dispatch),
            service,
        );
        let server = Server::bind(&cfg.server, registry, dispatcher).expect("bind");
        let addr = server.local_addr().expect("local addr");
        let shutdown = server.shutdown_handle();
        let thread = std::thread::spawn(move || server.run());

        Self {
            addr,
            state: None,
            shutdown,
            thread: Some(thread),
            runtime: Some(runtime),
        }
    }

    pub fn state(&self) -> &AppState {
        self.state.as_ref().expect("demo server")
    }

    pub fn send(&self, raw: &[u8]) -> Reply {
        Reply::parse(&self.send_raw(raw))
    }

    pub fn send_raw(&self, raw: &[u8]) -> String {
        let mut stream = self.connect();
        stream.write_all(raw).expect("write request");
        read_all(&mut stream)
    }

    pub fn request(&self, method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> Reply {
        self.send(build_request(method, path, headers, body).as_bytes())
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .expect("read timeout");
        stream
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(Duration::from_millis(100));
        }
    }
}

pub fn build_request(method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n");
    for (key, value) in headers {
        raw.push_str(&format!("{key}: {value}\r\n"));
    }
    if !body.is_empty() {
        raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw
}

pub fn read_all(stream: &mut TcpStream) -> String {
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Reads until `marker` has been seen, returning everything read.
pub fn read_until(stream: &mut TcpStream, marker: &str) -> String {
    let mut out = Vec::new();
    let mut chunk = [0u8; 256];
    while !String::from_utf8_lossy(&out).contains(marker) {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub raw: String,
}

impl Reply {
    pub fn parse(raw: &str) -> Self {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
        let mut lines = head.split("\r\n");
        let status = lines
            .next()
            .and_then(|line| line.split(' ').nth(1))
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let headers = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            status,
            headers,
            body: body.to_string(),
            raw: raw.to_string(),
        }
    }

    /// Number of status lines on the wire.
    pub fn responses(&self) -> usize {
        self.raw.matches("HTTP/1.1 ").count()
    }

    /// The caller-supplied part of the body, after the status prefix line.
    pub fn message(&self) -> &str {
        self.body.split_once("\r\n").map(|(_, rest)| rest).unwrap_or("")
    }
}
