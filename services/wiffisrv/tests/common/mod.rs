//! Test Common Utilities
//!
//! Starts a gateway with a memory store behind a loopback listener.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wiffi_store::{MemoryStore, ObjectStore};
use wiffisrv::core::config::{AppConfig, DeviceConfig};
use wiffisrv::{Gateway, WiffiServer};

pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;

/// Running gateway on an ephemeral port
pub struct TestGateway {
    pub memory: Arc<MemoryStore>,
    pub gateway: Arc<Gateway>,
    pub addr: String,
    token: CancellationToken,
    handle: JoinHandle<wiffisrv::Result<()>>,
}

impl TestGateway {
    pub async fn start(config: AppConfig) -> Self {
        let memory = Arc::new(MemoryStore::new());
        let gateway = Arc::new(Gateway::new(memory.clone(), &config).unwrap());
        gateway.start().await.unwrap();

        let server = WiffiServer::bind("127.0.0.1:0", gateway.clone(), config.server.max_buffer_size)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let token = CancellationToken::new();
        let handle = tokio::spawn(server.serve(token.clone()));

        Self {
            memory,
            gateway,
            addr,
            token,
            handle,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        self.gateway.store()
    }

    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(&self.addr).await.unwrap()
    }

    /// Open a connection, send `data` and close it
    pub async fn send(&self, data: &[u8]) {
        let mut stream = self.connect().await;
        stream.write_all(data).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    pub async fn value(&self, id: &str) -> Option<Value> {
        self.store().get_point(id).await.unwrap().map(|s| s.val)
    }

    /// Poll until `id` holds `expected`
    pub async fn wait_for_value(&self, id: &str, expected: Value) -> bool {
        for _ in 0..200 {
            if self.value(id).await.as_ref() == Some(&expected) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Poll until the store has seen `count` value writes
    pub async fn wait_for_writes(&self, count: u64) -> bool {
        for _ in 0..200 {
            if self.memory.stats().write_count >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    pub async fn stop(self) {
        self.token.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

pub fn device(ip: &str, name: &str, room: Option<&str>) -> DeviceConfig {
    DeviceConfig {
        ip: ip.to_string(),
        name: name.to_string(),
        room: room.map(str::to_string),
    }
}

pub fn config_with(devices: Vec<DeviceConfig>) -> AppConfig {
    let mut config = AppConfig::default();
    config.devices = devices;
    config
}

/// JSON text followed by a terminator byte
pub fn terminated(json: &str, terminator: u8) -> Vec<u8> {
    let mut bytes = json.as_bytes().to_vec();
    bytes.push(terminator);
    bytes
}
