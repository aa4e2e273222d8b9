//! TCP server receiving Wiffi datagrams
//!
//! One task per connection; each owns its receive buffer and hands every
//! extracted frame to the gateway before reading on.

use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use common::logging::WIRE_TARGET;

use crate::core::gateway::Gateway;
use crate::core::layout;
use crate::error::{Result, WiffiSrvError};
use crate::protocol::FrameExtractor;

const READ_CHUNK: usize = 4096;

/// Listening Wiffi server
#[derive(Debug)]
pub struct WiffiServer {
    listener: TcpListener,
    gateway: Arc<Gateway>,
    max_buffer_size: usize,
}

impl WiffiServer {
    /// Bind the listener and mark the connection point accordingly
    pub async fn bind(addr: &str, gateway: Arc<Gateway>, max_buffer_size: usize) -> Result<Self> {
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                layout::set_connection(gateway.store(), false).await;
                return Err(WiffiSrvError::connection(format!(
                    "Failed to bind to {}: {}",
                    addr, e
                )));
            },
        };

        let local = listener.local_addr()?;
        info!("Server listening on {}", local);
        layout::set_connection(gateway.store(), true).await;

        Ok(Self {
            listener,
            gateway,
            max_buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `token` is cancelled or accepting fails
    ///
    /// The listener is not restarted after an accept error.
    pub async fn serve(self, token: CancellationToken) -> Result<()> {
        let result = loop {
            tokio::select! {
                _ = token.cancelled() => break Ok(()),
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Connection from {}", peer);
                        let gateway = self.gateway.clone();
                        let token = token.child_token();
                        let max = self.max_buffer_size;
                        tokio::spawn(async move {
                            handle_connection(stream, peer, gateway, max, token).await;
                        });
                    },
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break Err(WiffiSrvError::connection(format!("Accept failed: {}", e)));
                    },
                },
            }
        };

        drop(self.listener);
        layout::set_connection(self.gateway.store(), false).await;
        info!("Server closed");
        result
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    gateway: Arc<Gateway>,
    max_buffer_size: usize,
    token: CancellationToken,
) {
    let mut extractor = FrameExtractor::new(max_buffer_size);
    let mut buf = BytesMut::with_capacity(READ_CHUNK);

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = token.cancelled() => break,
            read = stream.read_buf(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("Connection from {} closed", peer);
                break;
            },
            Ok(_) => {
                if let Some(frame) = extractor.push(&buf) {
                    debug!(target: WIRE_TARGET, "{} {}", peer, frame.raw);
                    // Errors are logged by the gateway
                    let _ = gateway.handle_frame(&frame.payload).await;
                }
            },
            Err(e) => {
                error!("Error reading from {}: {}", peer, e);
                break;
            },
        }
    }

    if !extractor.is_empty() {
        debug!(
            "Dropping {} unparsed bytes from {}",
            extractor.buffered(),
            peer
        );
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::layout::CONNECTION_POINT;
    use serde_json::json;
    use wiffi_store::helpers::create_test_store;

    async fn gateway() -> Arc<Gateway> {
        let gateway = Gateway::new(create_test_store(), &AppConfig::default()).unwrap();
        gateway.start().await.unwrap();
        Arc::new(gateway)
    }

    async fn connection_state(gateway: &Gateway) -> serde_json::Value {
        gateway
            .store()
            .get_point(CONNECTION_POINT)
            .await
            .unwrap()
            .unwrap()
            .val
    }

    #[tokio::test]
    async fn test_bind_and_shutdown_update_connection() {
        let gateway = gateway().await;
        let server = WiffiServer::bind("127.0.0.1:0", gateway.clone(), 1024)
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(connection_state(&gateway).await, json!(true));

        let token = CancellationToken::new();
        let handle = tokio::spawn(server.serve(token.clone()));
        token.cancel();
        handle.await.unwrap().unwrap();
        assert_eq!(connection_state(&gateway).await, json!(false));
    }

    #[tokio::test]
    async fn test_bind_failure_sets_disconnected() {
        let gateway = gateway().await;
        let first = WiffiServer::bind("127.0.0.1:0", gateway.clone(), 1024)
            .await
            .unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = WiffiServer::bind(&addr, gateway.clone(), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, WiffiSrvError::ConnectionError(_)));
        assert_eq!(connection_state(&gateway).await, json!(false));
    }
}
