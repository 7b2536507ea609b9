//! Client facade over a `Transport`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::handlers::{LogHandler, MessageHandler, ProgressHandler};
use crate::config::ClientConfig;
use crate::error::{ToolError, ToolResult};
use crate::logging::{Logger, NoOpLogger};
use crate::protocol::{ClientRequest, ServerMessage};
use crate::transport::Transport;
use crate::types::{CallId, ProgressEvent, ToolDefinition};

/// Per-call options for `Client::call_tool`
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Invoked for every progress event of this call, in order
    pub progress_handler: Option<Arc<dyn ProgressHandler>>,
    /// Overrides the configured default timeout
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress_handler = Some(handler);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("progress_handler", &self.progress_handler.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct PendingCall {
    progress: UnboundedSender<ProgressEvent>,
    result: oneshot::Sender<ToolResult<Value>>,
}

/// Requests waiting for a reply from the server
#[derive(Default)]
struct Pending {
    lists: Mutex<HashMap<u64, oneshot::Sender<Vec<ToolDefinition>>>>,
    calls: Mutex<HashMap<CallId, PendingCall>>,
}

impl Pending {
    /// Drop every waiter; their receivers observe a closed connection
    fn clear(&self) {
        self.lists.lock().clear();
        self.calls.lock().clear();
    }
}

struct ActiveConnection {
    requests: UnboundedSender<ClientRequest>,
    pending: Arc<Pending>,
    dispatcher: JoinHandle<()>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.pending.clear();
    }
}

/// Client for listing and calling tools over a transport
///
/// ```rust,ignore
/// let client = Client::new(transport, ClientConfig::default())
///     .with_log_handler(Arc::new(LoggerLogHandler::new(logger.clone())));
/// client.connect().await?;
///
/// let options = CallOptions::new()
///     .with_progress_handler(Arc::new(|p: &ProgressEvent| println!("{:?}", p.percentage())));
/// let result = client.call_tool("fruit_processor", json!({"items": ["apple"]}), options).await?;
/// client.disconnect();
/// ```
pub struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    log_handler: Option<Arc<dyn LogHandler>>,
    message_handler: Option<Arc<dyn MessageHandler>>,
    logger: Arc<dyn Logger>,
    connection: Mutex<Option<ActiveConnection>>,
    next_id: AtomicU64,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            log_handler: None,
            message_handler: None,
            logger: Arc::new(NoOpLogger::new()),
            connection: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Handler for tool log records; takes effect on the next `connect`
    pub fn with_log_handler(mut self, handler: Arc<dyn LogHandler>) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Handler for server notifications; takes effect on the next `connect`
    pub fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.message_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Open the transport connection; a no-op when already connected
    pub async fn connect(&self) -> ToolResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let connection = self.transport.connect(&self.config).await?;
        let pending = Arc::new(Pending::default());
        let dispatcher = tokio::spawn(dispatch(
            connection.messages,
            Arc::clone(&pending),
            self.log_handler.clone(),
            self.message_handler.clone(),
            Arc::clone(&self.logger),
        ));
        let active = ActiveConnection {
            requests: connection.requests,
            pending,
            dispatcher,
        };

        let mut slot = self.connection.lock();
        if slot.is_some() {
            // Lost a race with a concurrent connect; `active` closes on drop
            return Ok(());
        }
        *slot = Some(active);
        self.logger.info(&format!("[Client] Connected via {} transport", self.transport.name()));
        Ok(())
    }

    /// Close the connection; calls still waiting fail with a transport error
    pub fn disconnect(&self) {
        let previous = self.connection.lock().take();
        if previous.is_some() {
            self.logger.info("[Client] Disconnected");
        }
    }

    /// List the server's enabled tools; never cached
    pub async fn list_tools(&self) -> ToolResult<Vec<ToolDefinition>> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();

        let (requests, pending) = self.channels()?;
        pending.lists.lock().insert(request_id, reply_tx);
        if requests.send(ClientRequest::ListTools { request_id }).is_err() {
            pending.lists.lock().remove(&request_id);
            return Err(ToolError::transport("connection closed"));
        }

        let reply = async {
            reply_rx
                .await
                .map_err(|_| ToolError::transport("connection closed before tools were listed"))
        };

        match self.config.timeout() {
            None => reply.await,
            Some(limit) => match tokio::time::timeout(limit, reply).await {
                Ok(tools) => tools,
                Err(_) => {
                    pending.lists.lock().remove(&request_id);
                    Err(ToolError::Timeout(format!("tools/list after {:?}", limit)))
                }
            },
        }
    }

    /// Call a tool and wait for its result
    ///
    /// Progress events are handed to `options.progress_handler` on this task,
    /// in order, all before the result is returned. When the timeout expires
    /// the server is asked to cancel the call and any late result is dropped.
    ///
    /// Dropping the returned future before it completes abandons the call:
    /// the server is asked to cancel it, as on a timeout.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        options: CallOptions,
    ) -> ToolResult<Value> {
        let call_id = CallId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let (result_tx, mut result_rx) = oneshot::channel();

        let (requests, pending) = self.channels()?;
        pending.calls.lock().insert(
            call_id,
            PendingCall {
                progress: progress_tx,
                result: result_tx,
            },
        );

        let request = ClientRequest::CallTool {
            call_id,
            name: name.to_string(),
            arguments,
        };
        if requests.send(request).is_err() {
            pending.calls.lock().remove(&call_id);
            return Err(ToolError::transport("connection closed"));
        }
        self.logger.debug(&format!("[Client] {} {} sent", call_id, name));
        let _abandon = AbandonOnDrop {
            call_id,
            pending: &pending,
            requests: &requests,
            logger: self.logger.as_ref(),
        };

        let handler = options.progress_handler;
        let exchange = async {
            loop {
                tokio::select! {
                    biased;
                    Some(event) = progress_rx.recv() => {
                        if let Some(handler) = &handler {
                            handler.on_progress(&event).await;
                        }
                    }
                    result = &mut result_rx => {
                        drain_progress(&mut progress_rx, handler.as_deref()).await;
                        return result.unwrap_or_else(|_| {
                            Err(ToolError::transport("connection closed before the call completed"))
                        });
                    }
                }
            }
        };

        match options.timeout.or_else(|| self.config.timeout()) {
            None => exchange.await,
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // The guard sends the cancel once this returns
                    self.logger.warn(&format!(
                        "[Client] {} {} timed out after {:?}",
                        call_id, name, limit
                    ));
                    Err(ToolError::Timeout(format!("{} after {:?}", name, limit)))
                }
            },
        }
    }

    fn channels(&self) -> ToolResult<(UnboundedSender<ClientRequest>, Arc<Pending>)> {
        let slot = self.connection.lock();
        let active = slot
            .as_ref()
            .ok_or_else(|| ToolError::transport("client is not connected"))?;
        Ok((active.requests.clone(), Arc::clone(&active.pending)))
    }
}

/// Cancels a call whose result never reached `call_tool`
///
/// The dispatcher removes the pending entry when a result arrives, so an
/// entry still present on drop means the caller gave up on the call.
struct AbandonOnDrop<'a> {
    call_id: CallId,
    pending: &'a Pending,
    requests: &'a UnboundedSender<ClientRequest>,
    logger: &'a dyn Logger,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.pending.calls.lock().remove(&self.call_id).is_some() {
            self.logger.debug(&format!("[Client] Cancelling abandoned {}", self.call_id));
            let _ = self.requests.send(ClientRequest::Cancel { call_id: self.call_id });
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

async fn drain_progress(
    progress: &mut UnboundedReceiver<ProgressEvent>,
    handler: Option<&dyn ProgressHandler>,
) {
    while let Ok(event) = progress.try_recv() {
        if let Some(handler) = handler {
            handler.on_progress(&event).await;
        }
    }
}

/// Routes inbound server messages to waiters and handlers
async fn dispatch(
    mut messages: UnboundedReceiver<ServerMessage>,
    pending: Arc<Pending>,
    log_handler: Option<Arc<dyn LogHandler>>,
    message_handler: Option<Arc<dyn MessageHandler>>,
    logger: Arc<dyn Logger>,
) {
    while let Some(message) = messages.recv().await {
        match message {
            ServerMessage::Tools { request_id, tools } => {
                let waiter = pending.lists.lock().remove(&request_id);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(tools);
                }
            }
            ServerMessage::CallResult { call_id, result } => {
                let waiter = pending.calls.lock().remove(&call_id);
                complete(waiter, call_id, Ok(result), logger.as_ref());
            }
            ServerMessage::CallError { call_id, error } => {
                let waiter = pending.calls.lock().remove(&call_id);
                complete(waiter, call_id, Err(error.into()), logger.as_ref());
            }
            ServerMessage::Progress { call_id, progress } => {
                let sender = pending.calls.lock().get(&call_id).map(|call| call.progress.clone());
                if let Some(sender) = sender {
                    let _ = sender.send(progress);
                }
            }
            ServerMessage::Log { call_id, message } => {
                if let Some(handler) = &log_handler {
                    handler.on_log(call_id, &message).await;
                }
            }
            ServerMessage::ListChanged => {
                logger.debug("[Client] Tool list changed");
                if let Some(handler) = &message_handler {
                    handler.on_tool_list_changed().await;
                }
            }
        }
    }

    logger.info("[Client] Connection closed by server");
    pending.clear();
}

fn complete(
    waiter: Option<PendingCall>,
    call_id: CallId,
    outcome: ToolResult<Value>,
    logger: &dyn Logger,
) {
    match waiter {
        Some(call) => {
            let _ = call.result.send(outcome);
        }
        None => logger.debug(&format!("[Client] Discarding late result for {}", call_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ToolCache;
    use crate::engine::{CallContext, InvocationEngine};
    use crate::error::ErrorKind;
    use crate::logging::MemoryLogger;
    use crate::tools::{from_fn, ToolHandler, ToolRegistry};
    use crate::transport::LocalTransport;
    use crate::types::LogMessage;
    use async_trait::async_trait;
    use serde_json::json;

    struct Counter;

    #[async_trait]
    impl ToolHandler for Counter {
        async fn call(&self, ctx: &CallContext) -> ToolResult<Value> {
            ctx.warning("counting");
            for i in 0..=3 {
                ctx.report_progress(i as f64, Some(3.0), None);
                tokio::task::yield_now().await;
            }
            Ok(json!("counted"))
        }
    }

    struct Slow;

    #[async_trait]
    impl ToolHandler for Slow {
        async fn call(&self, ctx: &CallContext) -> ToolResult<Value> {
            ctx.set_state("busy", json!(true));
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!("too late"))
        }
    }

    fn setup() -> (Arc<ToolRegistry>, Arc<InvocationEngine>, Arc<LocalTransport>) {
        let registry = Arc::new(ToolRegistry::new(Arc::new(NoOpLogger::new())));
        registry
            .register(ToolDefinition::new("counter", "Count to three"), Arc::new(Counter))
            .unwrap();
        registry.register(ToolDefinition::new("slow", "Takes a minute"), Arc::new(Slow)).unwrap();
        registry
            .register(
                ToolDefinition::new("echo", "Echo").with_schema(json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                })),
                from_fn(|ctx| Ok(json!(ctx.argument_str("text").unwrap_or_default()))),
            )
            .unwrap();

        let engine = Arc::new(InvocationEngine::new(registry.clone(), Arc::new(NoOpLogger::new())));
        let transport = Arc::new(LocalTransport::new(engine.clone()));
        (registry, engine, transport)
    }

    #[tokio::test]
    async fn test_not_connected() {
        let (_, _, transport) = setup();
        let client = Client::new(transport, ClientConfig::default());

        let err = client.list_tools().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_progress_handler_sees_every_event_before_result() {
        let (_, _, transport) = setup();
        let client = Client::new(transport, ClientConfig::default());
        client.connect().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |event: &ProgressEvent| {
            sink.lock().push(event.percentage().unwrap_or_default().round() as u32);
        };
        let options = CallOptions::new().with_progress_handler(Arc::new(handler));

        let result = client.call_tool("counter", json!({}), options).await.unwrap();
        assert_eq!(result, json!("counted"));
        assert_eq!(*seen.lock(), vec![0, 33, 67, 100]);
    }

    #[tokio::test]
    async fn test_failed_call_keeps_client_usable() {
        let (_, _, transport) = setup();
        let client = Client::new(transport, ClientConfig::default());
        client.connect().await.unwrap();

        let err = client.call_tool("missing", json!({}), CallOptions::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref n) if n == "missing"));

        let err = client.call_tool("echo", json!({}), CallOptions::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        let ok = client
            .call_tool("echo", json!({ "text": "still here" }), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(ok, json!("still here"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_remote_call() {
        let (_, engine, transport) = setup();
        let logger = Arc::new(MemoryLogger::new());
        let config = ClientConfig::default().with_timeout(Duration::from_secs(1));
        let client = Client::new(transport, config).with_logger(logger.clone());
        client.connect().await.unwrap();

        let err = client.call_tool("slow", json!({}), CallOptions::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(logger.contains("timed out"));

        // The server observes the cancel and releases the call's session
        for _ in 0..100 {
            if engine.sessions().live_scopes() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.sessions().live_scopes(), 0);

        // A per-call timeout overrides the configured one
        let ok = client
            .call_tool(
                "echo",
                json!({ "text": "fast" }),
                CallOptions::new().with_timeout(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(ok, json!("fast"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_is_cancelled_on_the_server() {
        let (_, engine, transport) = setup();
        let client = Client::new(transport, ClientConfig::default());
        client.connect().await.unwrap();

        let outer = tokio::time::timeout(
            Duration::from_secs(1),
            client.call_tool("slow", json!({}), CallOptions::new()),
        )
        .await;
        assert!(outer.is_err());

        for _ in 0..100 {
            if engine.sessions().live_scopes() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.sessions().live_scopes(), 0);

        let (_, pending) = client.channels().unwrap();
        assert!(pending.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tool_returns_execution_error() {
        let (registry, engine, transport) = setup();
        registry
            .register(
                ToolDefinition::new("boom", "Always panics"),
                from_fn(|_| panic!("tool body blew up")),
            )
            .unwrap();
        let client = Client::new(transport, ClientConfig::default());
        client.connect().await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            client.call_tool("boom", json!({}), CallOptions::new()),
        )
        .await
        .expect("call should resolve");
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("tool body blew up"));
        assert_eq!(engine.sessions().live_scopes(), 0);

        let ok = client
            .call_tool("echo", json!({ "text": "after" }), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(ok, json!("after"));
    }

    #[tokio::test]
    async fn test_log_and_message_handlers() {
        let (registry, _, transport) = setup();
        let logs = Arc::new(Mutex::new(Vec::new()));
        let sink = logs.clone();
        let cache = Arc::new(ToolCache::new());

        let client = Client::new(transport, ClientConfig::default())
            .with_log_handler(Arc::new(move |_: CallId, message: &LogMessage| {
                sink.lock().push(format!("{}:{}", message.level, message.message));
            }))
            .with_message_handler(cache.clone());
        client.connect().await.unwrap();

        cache.store(client.list_tools().await.unwrap());
        assert_eq!(cache.get().unwrap().len(), 3);

        client.call_tool("counter", json!({}), CallOptions::new()).await.unwrap();
        registry.set_enabled("slow", false).unwrap();

        for _ in 0..100 {
            if cache.invalidations() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(cache.get().is_none());
        assert_eq!(client.list_tools().await.unwrap().len(), 2);
        assert_eq!(*logs.lock(), vec!["warning:counting".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnect_releases_connection() {
        let (_, _, transport) = setup();
        let client = Client::new(transport, ClientConfig::default());
        client.connect().await.unwrap();
        assert!(client.is_connected());

        client.disconnect();
        assert!(!client.is_connected());
        let err = client
            .call_tool("echo", json!({ "text": "x" }), CallOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        // Reconnecting works after an explicit disconnect
        client.connect().await.unwrap();
        assert!(client.list_tools().await.is_ok());
    }
}
