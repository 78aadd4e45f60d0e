//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use deferred_response::config::ServiceConfig;
use deferred_response::deferred::ErrorSink;
use deferred_response::{DeferredServer, Shutdown};

/// A running server on an ephemeral port.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<ServiceConfig>,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

#[allow(dead_code)]
pub async fn start_server(mut config: ServiceConfig) -> TestServer {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = tokio::net::TcpListener::bind(&config.listener.bind_address)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_tx, config_rx) = mpsc::unbounded_channel();
    let server = DeferredServer::new(config);
    let handle = tokio::spawn(server.run(listener, config_rx, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        config_tx,
        handle,
    }
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Poll `/status` until `count` responses are pending; returns their ids.
#[allow(dead_code)]
pub async fn wait_for_pending(server: &TestServer, count: usize) -> Vec<Uuid> {
    let client = client();
    for _ in 0..200 {
        let status: serde_json::Value = client
            .get(server.url("/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let pending: Vec<Uuid> = serde_json::from_value(status["pending"].clone()).unwrap();
        if pending.len() >= count {
            return pending;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {count} pending responses");
}

/// Error sink recording listener failures.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    pub failures: Mutex<Vec<(usize, String)>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl ErrorSink for RecordingSink {
    fn listener_failed(&self, _response_id: Uuid, listener_index: usize, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((listener_index, message.to_string()));
    }
}
