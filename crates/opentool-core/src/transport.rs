//! Transport abstraction between the client facade and a tool server
//!
//! A transport hands back a `Connection`: an outbound request sender and an
//! inbound message receiver. Dropping the request sender closes the
//! connection from the client side.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::ClientConfig;
use crate::engine::InvocationEngine;
use crate::error::{ToolError, ToolResult};
use crate::logging::Logger;
use crate::protocol::{ClientRequest, ServerMessage};
use crate::server::ToolServer;

/// An open client <-> server channel pair
#[derive(Debug)]
pub struct Connection {
    pub requests: UnboundedSender<ClientRequest>,
    pub messages: UnboundedReceiver<ServerMessage>,
}

/// Something that can open a connection to a tool server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    /// Open a connection using the endpoint and headers in `config`
    async fn connect(&self, config: &ClientConfig) -> ToolResult<Connection>;
}

/// In-process transport: each connection runs a `ToolServer` task
///
/// The endpoint and auth headers are accepted but not used.
pub struct LocalTransport {
    engine: Arc<InvocationEngine>,
    logger: Arc<dyn Logger>,
}

impl LocalTransport {
    pub fn new(engine: Arc<InvocationEngine>) -> Self {
        let logger = engine.logger();
        Self { engine, logger }
    }

    pub fn engine(&self) -> &Arc<InvocationEngine> {
        &self.engine
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&self, config: &ClientConfig) -> ToolResult<Connection> {
        config
            .validate()
            .map_err(|e| ToolError::transport(format!("invalid client config: {}", e)))?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        tokio::spawn(ToolServer::new(Arc::clone(&self.engine)).serve(request_rx, message_tx));

        self.logger.info(&format!(
            "[LocalTransport] Connected (endpoint {}, {} header(s))",
            config.transport_endpoint,
            config.auth_headers.len()
        ));

        Ok(Connection {
            requests: request_tx,
            messages: message_rx,
        })
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport").finish_non_exhaustive()
    }
}
