//! Server loop: turns wire requests into engine calls
//!
//! One loop per connection. Each `tools/call` runs in its own task that
//! forwards the call's progress and log streams to the connection before
//! sending the final result, so a result never overtakes its own progress.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::channel::call_channel;
use crate::engine::InvocationEngine;
use crate::error::{ErrorPayload, ToolError};
use crate::logging::Logger;
use crate::protocol::{ClientRequest, ServerMessage};
use crate::types::{CallId, CancellationToken};

type InFlight = Arc<Mutex<HashMap<CallId, CancellationToken>>>;

/// Serves one client connection on top of an `InvocationEngine`
pub struct ToolServer {
    engine: Arc<InvocationEngine>,
    logger: Arc<dyn Logger>,
}

impl ToolServer {
    pub fn new(engine: Arc<InvocationEngine>) -> Self {
        let logger = engine.logger();
        Self { engine, logger }
    }

    /// Run until the client closes its request stream
    ///
    /// Calls still in flight when the loop exits are cancelled.
    pub async fn serve(
        self,
        mut requests: UnboundedReceiver<ClientRequest>,
        outbound: UnboundedSender<ServerMessage>,
    ) {
        let mut list_changed = self.engine.subscribe();
        let in_flight: InFlight = Arc::default();

        self.logger.debug("[ToolServer] Connection opened");

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle(request, &outbound, &in_flight),
                    None => break,
                },
                changed = list_changed.recv() => match changed {
                    // A lagged receiver missed some changes; one notification covers them
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if outbound.send(ServerMessage::ListChanged).is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        let pending: Vec<CancellationToken> =
            in_flight.lock().drain().map(|(_, token)| token).collect();
        if !pending.is_empty() {
            self.logger.info(&format!(
                "[ToolServer] Connection closed, cancelling {} in-flight call(s)",
                pending.len()
            ));
        }
        for token in pending {
            token.cancel();
        }
        self.logger.debug("[ToolServer] Connection closed");
    }

    fn handle(
        &self,
        request: ClientRequest,
        outbound: &UnboundedSender<ServerMessage>,
        in_flight: &InFlight,
    ) {
        match request {
            ClientRequest::ListTools { request_id } => {
                let tools = self.engine.list_tools();
                let _ = outbound.send(ServerMessage::Tools { request_id, tools });
            }
            ClientRequest::CallTool {
                call_id,
                name,
                arguments,
            } => self.spawn_call(call_id, name, arguments, outbound.clone(), Arc::clone(in_flight)),
            ClientRequest::Cancel { call_id } => {
                let token = in_flight.lock().get(&call_id).cloned();
                match token {
                    Some(token) => {
                        crate::log_info!(self.logger, "[ToolServer] Cancelling {}", call_id);
                        token.cancel();
                    }
                    None => self
                        .logger
                        .debug(&format!("[ToolServer] Cancel for unknown or finished {}", call_id)),
                }
            }
        }
    }

    fn spawn_call(
        &self,
        call_id: CallId,
        name: String,
        arguments: Value,
        outbound: UnboundedSender<ServerMessage>,
        in_flight: InFlight,
    ) {
        let cancel = CancellationToken::new();
        {
            let mut calls = in_flight.lock();
            if calls.contains_key(&call_id) {
                let err = ToolError::execution(format!("{} is already in flight", call_id));
                let _ = outbound.send(ServerMessage::CallError {
                    call_id,
                    error: ErrorPayload::from(&err),
                });
                return;
            }
            calls.insert(call_id, cancel.clone());
        }

        let entry = InFlightEntry { call_id, in_flight };
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let (emitter, mut events) = call_channel(engine.logger());
            let call = engine.call_tool_streaming(&name, arguments, emitter, cancel);
            tokio::pin!(call);

            let outcome = loop {
                tokio::select! {
                    biased;
                    Some(progress) = events.progress.recv() => {
                        let _ = outbound.send(ServerMessage::Progress { call_id, progress });
                    }
                    Some(message) = events.logs.recv() => {
                        let _ = outbound.send(ServerMessage::Log { call_id, message });
                    }
                    outcome = &mut call => break outcome,
                }
            };

            // Flush whatever the call emitted after the last forward
            while let Ok(progress) = events.progress.try_recv() {
                let _ = outbound.send(ServerMessage::Progress { call_id, progress });
            }
            while let Ok(message) = events.logs.try_recv() {
                let _ = outbound.send(ServerMessage::Log { call_id, message });
            }

            drop(entry);

            let reply = match outcome {
                Ok(result) => ServerMessage::CallResult { call_id, result },
                Err(e) => ServerMessage::CallError {
                    call_id,
                    error: ErrorPayload::from(&e),
                },
            };
            let _ = outbound.send(reply);
        });
    }
}

/// Removes a call from the in-flight map when its task ends, however it ends
struct InFlightEntry {
    call_id: CallId,
    in_flight: InFlight,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.call_id);
    }
}

impl std::fmt::Debug for ToolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServer").field("engine", &self.engine).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CallContext;
    use crate::error::{ErrorKind, ToolResult};
    use crate::logging::NoOpLogger;
    use crate::tools::{from_fn, ToolHandler, ToolRegistry};
    use crate::types::ToolDefinition;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Stepper;

    #[async_trait]
    impl ToolHandler for Stepper {
        async fn call(&self, ctx: &CallContext) -> ToolResult<Value> {
            ctx.info("starting");
            for i in 1..=2 {
                ctx.report_progress(i as f64, Some(2.0), None);
            }
            Ok(json!("stepped"))
        }
    }

    struct Forever;

    #[async_trait]
    impl ToolHandler for Forever {
        async fn call(&self, _ctx: &CallContext) -> ToolResult<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }
    }

    fn start() -> (
        Arc<InvocationEngine>,
        UnboundedSender<ClientRequest>,
        UnboundedReceiver<ServerMessage>,
    ) {
        let registry = Arc::new(ToolRegistry::new(Arc::new(NoOpLogger::new())));
        registry.register(ToolDefinition::new("stepper", "s"), Arc::new(Stepper)).unwrap();
        registry.register(ToolDefinition::new("forever", "f"), Arc::new(Forever)).unwrap();
        let engine = Arc::new(InvocationEngine::new(registry, Arc::new(NoOpLogger::new())));

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        tokio::spawn(ToolServer::new(engine.clone()).serve(req_rx, msg_tx));
        (engine, req_tx, msg_rx)
    }

    #[tokio::test]
    async fn test_progress_precedes_result() {
        let (_engine, requests, mut messages) = start();
        requests
            .send(ClientRequest::CallTool {
                call_id: CallId(1),
                name: "stepper".to_string(),
                arguments: json!({}),
            })
            .unwrap();

        let mut progress = Vec::new();
        let mut logs = 0;
        loop {
            match messages.recv().await.unwrap() {
                ServerMessage::Progress { call_id, progress: p } => {
                    assert_eq!(call_id, CallId(1));
                    progress.push(p.progress);
                }
                ServerMessage::Log { message, .. } => {
                    assert_eq!(message.message, "starting");
                    logs += 1;
                }
                ServerMessage::CallResult { result, .. } => {
                    assert_eq!(result, json!("stepped"));
                    break;
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
        assert_eq!(progress, vec![1.0, 2.0]);
        assert_eq!(logs, 1);
    }

    #[tokio::test]
    async fn test_errors_and_listing() {
        let (engine, requests, mut messages) = start();

        requests.send(ClientRequest::ListTools { request_id: 9 }).unwrap();
        match messages.recv().await.unwrap() {
            ServerMessage::Tools { request_id, tools } => {
                assert_eq!(request_id, 9);
                assert_eq!(tools.len(), 2);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        requests
            .send(ClientRequest::CallTool {
                call_id: CallId(2),
                name: "nope".to_string(),
                arguments: Value::Null,
            })
            .unwrap();
        match messages.recv().await.unwrap() {
            ServerMessage::CallError { call_id, error } => {
                assert_eq!(call_id, CallId(2));
                assert_eq!(error.kind, ErrorKind::NotFound);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        engine
            .registry()
            .register(ToolDefinition::new("late", "l"), from_fn(|_| Ok(Value::Null)))
            .unwrap();
        assert_eq!(messages.recv().await.unwrap(), ServerMessage::ListChanged);
    }

    #[tokio::test]
    async fn test_cancel_request() {
        let (_engine, requests, mut messages) = start();
        requests
            .send(ClientRequest::CallTool {
                call_id: CallId(5),
                name: "forever".to_string(),
                arguments: json!({}),
            })
            .unwrap();
        tokio::task::yield_now().await;
        requests.send(ClientRequest::Cancel { call_id: CallId(5) }).unwrap();

        match messages.recv().await.unwrap() {
            ServerMessage::CallError { call_id, error } => {
                assert_eq!(call_id, CallId(5));
                assert_eq!(error.kind, ErrorKind::Cancelled);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closing_connection_cancels_in_flight_calls() {
        let (engine, requests, mut messages) = start();
        requests
            .send(ClientRequest::CallTool {
                call_id: CallId(7),
                name: "forever".to_string(),
                arguments: json!({}),
            })
            .unwrap();
        for _ in 0..100 {
            if engine.sessions().live_scopes() == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.sessions().live_scopes(), 1);

        drop(requests);

        match messages.recv().await.unwrap() {
            ServerMessage::CallError { call_id, error } => {
                assert_eq!(call_id, CallId(7));
                assert_eq!(error.kind, ErrorKind::Cancelled);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(engine.sessions().live_scopes(), 0);
    }

    #[tokio::test]
    async fn test_panicking_tool_reports_error_and_frees_call_id() {
        let (engine, requests, mut messages) = start();
        engine
            .registry()
            .register(ToolDefinition::new("boom", "b"), from_fn(|_| panic!("tool body blew up")))
            .unwrap();

        for _ in 0..2 {
            requests
                .send(ClientRequest::CallTool {
                    call_id: CallId(8),
                    name: "boom".to_string(),
                    arguments: json!({}),
                })
                .unwrap();
            let reply = loop {
                match messages.recv().await.unwrap() {
                    ServerMessage::ListChanged => continue,
                    other => break other,
                }
            };
            match reply {
                ServerMessage::CallError { call_id, error } => {
                    assert_eq!(call_id, CallId(8));
                    assert_eq!(error.kind, ErrorKind::Execution);
                    assert!(error.message.contains("tool body blew up"));
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }
}
