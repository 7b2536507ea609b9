//! Invocation engine: resolve, validate, run the chain, report

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};

use super::context::CallContext;
use super::state::{CallState, CallTracker};
use crate::channel::{CallEmitter, ListChangedReceiver};
use crate::error::{ToolError, ToolResult};
use crate::logging::{Logger, NoOpLogger};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::session::SessionStore;
use crate::tools::{ToolHandler, ToolRegistry};
use crate::types::{CallId, CancellationToken, ToolDefinition};

/// Builder for `InvocationEngine`
pub struct EngineBuilder {
    registry: Arc<ToolRegistry>,
    chain: MiddlewareChain,
    logger: Arc<dyn Logger>,
}

impl EngineBuilder {
    /// Append a middleware; middlewares run in the order they are added
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.chain.push(middleware);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> InvocationEngine {
        InvocationEngine {
            registry: self.registry,
            chain: self.chain,
            sessions: Arc::new(SessionStore::new()),
            next_call_id: AtomicU64::new(1),
            logger: self.logger,
        }
    }
}

/// Runs tool calls against a registry through a middleware chain
pub struct InvocationEngine {
    registry: Arc<ToolRegistry>,
    chain: MiddlewareChain,
    sessions: Arc<SessionStore>,
    next_call_id: AtomicU64,
    logger: Arc<dyn Logger>,
}

impl InvocationEngine {
    /// Start building an engine around `registry`
    pub fn builder(registry: Arc<ToolRegistry>) -> EngineBuilder {
        EngineBuilder {
            registry,
            chain: MiddlewareChain::new(),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    /// Engine with no middleware
    pub fn new(registry: Arc<ToolRegistry>, logger: Arc<dyn Logger>) -> Self {
        Self::builder(registry).with_logger(logger).build()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn middleware(&self) -> &MiddlewareChain {
        &self.chain
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    /// Subscribe to list-changed notifications from the registry
    pub fn subscribe(&self) -> ListChangedReceiver {
        self.registry.subscribe()
    }

    /// Enabled tools, as served to clients; always reads the registry
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry
            .list()
            .iter()
            .map(ToolDefinition::published)
            .collect()
    }

    /// Call a tool without streaming progress anywhere
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ToolResult<Value> {
        let emitter = CallEmitter::detached(self.logger());
        self.call_tool_streaming(name, arguments, emitter, CancellationToken::new())
            .await
    }

    /// Call a tool, streaming progress and logs into `emitter`
    ///
    /// The call fails with `Cancelled` as soon as `cancel` fires; the tool
    /// body is dropped at its current suspension point.
    pub async fn call_tool_streaming(
        &self,
        name: &str,
        arguments: Value,
        emitter: CallEmitter,
        cancel: CancellationToken,
    ) -> ToolResult<Value> {
        let call_id = CallId(self.next_call_id.fetch_add(1, Ordering::SeqCst));
        let mut tracker = CallTracker::new(call_id, name, self.logger());
        tracker.advance(CallState::Resolving);

        let resolved = match self.resolve(name, arguments) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracker.advance(CallState::Failed);
                crate::log_warn!(
                    self.logger,
                    "[InvocationEngine] {} {} rejected: {}",
                    call_id,
                    name,
                    e
                );
                return Err(e);
            }
        };
        let (definition, handler, arguments) = resolved;

        tracker.advance(CallState::Executing);
        let mut ctx = CallContext::new(
            call_id,
            definition,
            arguments,
            self.sessions.open(call_id),
            emitter,
            cancel.clone(),
        );

        // A panic in the body or a middleware fails this call only
        let chain = AssertUnwindSafe(self.chain.run(&mut ctx, handler.as_ref())).catch_unwind();
        let outcome = match cancel.run_until_cancelled(chain).await {
            Some(Ok(outcome)) => outcome,
            Some(Err(panic)) => Err(ToolError::execution(format!(
                "tool '{}' panicked: {}",
                name,
                panic_message(panic.as_ref())
            ))),
            None => Err(ToolError::Cancelled(format!("{} ({})", name, call_id))),
        };

        let refresh = ctx.list_changed_requested();
        // Releases the session scope and closes the progress/log streams
        drop(ctx);

        match outcome {
            Ok(value) => {
                tracker.advance(CallState::Completed);
                if refresh {
                    self.registry.notify_list_changed();
                }
                Ok(value)
            }
            Err(e) => {
                tracker.advance(CallState::Failed);
                self.logger.warn(&format!("[InvocationEngine] {} {} failed: {}", call_id, name, e));
                Err(e)
            }
        }
    }

    fn resolve(
        &self,
        name: &str,
        arguments: Value,
    ) -> ToolResult<(Arc<ToolDefinition>, Arc<dyn ToolHandler>, Value)> {
        let resolved = self.registry.resolve(name)?;
        if !resolved.definition.enabled {
            return Err(ToolError::ToolDisabled(name.to_string()));
        }
        let arguments = validate_arguments(&resolved.definition, arguments)?;
        Ok((resolved.definition, resolved.handler, arguments))
    }
}

impl std::fmt::Debug for InvocationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationEngine")
            .field("registry", &self.registry)
            .field("middleware", &self.chain)
            .field("live_sessions", &self.sessions.live_scopes())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Normalize the arguments to an object and check required properties
fn validate_arguments(definition: &ToolDefinition, arguments: Value) -> ToolResult<Value> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        Value::Object(_) => arguments,
        other => {
            return Err(ToolError::execution(format!(
                "arguments for '{}' must be an object, got {}",
                definition.name,
                json_type_name(&other)
            )))
        }
    };

    let missing: Vec<&str> = definition
        .required_arguments()
        .into_iter()
        .filter(|key| arguments.get(*key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ToolError::execution(format!(
            "missing required argument(s) for '{}': {}",
            definition.name,
            missing.join(", ")
        )));
    }

    Ok(arguments)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
