//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use rosnode_core::config::NodeConfig;
use rosnode_core::rpc::RpcConnector;

/// Config with no settle pause and a short join timeout.
pub fn fast_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.node.name = "test_node".to_string();
    config.shutdown.settle_ms = 0;
    config.shutdown.join_timeout_secs = 0.5;
    config.rpc.request_timeout_secs = 2;
    config
}

/// Ordered record of events observed from several threads.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// Client that records how many calls are in flight at once.
#[derive(Debug)]
pub struct CountingClient {
    pub uri: String,
    pub serial: usize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CountingClient {
    /// Simulate a call lasting `duration`.
    pub fn work(&self, duration: Duration) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(duration);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connector counting how many clients it has built.
#[derive(Debug, Default)]
pub struct CountingConnector {
    pub built: AtomicUsize,
}

impl RpcConnector for CountingConnector {
    type Client = CountingClient;

    fn connect(&self, uri: &Url) -> CountingClient {
        // Widen the race window for concurrent first access.
        std::thread::sleep(Duration::from_millis(5));
        CountingClient {
            uri: uri.to_string(),
            serial: self.built.fetch_add(1, Ordering::SeqCst),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

/// Start a mock HTTP endpoint answering every request with `status` and
/// `body`. Returns its address.
pub fn start_mock_endpoint(status: u16, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            std::thread::spawn(move || {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 {
                        return;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut request_body = vec![0u8; content_length];
                let _ = reader.read_exact(&mut request_body);

                let response = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            });
        }
    });

    addr
}
