//! Per-invocation call context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::channel::CallEmitter;
use crate::error::ToolResult;
use crate::session::SessionScope;
use crate::types::{CallId, CancellationToken, ToolDefinition};

/// Everything a middleware or tool body can see about the current call
///
/// A context is created fresh for every invocation and dropped when the
/// call finishes, which releases its session scope.
pub struct CallContext {
    call_id: CallId,
    tool: Arc<ToolDefinition>,
    arguments: Value,
    session: SessionScope,
    emitter: CallEmitter,
    cancel: CancellationToken,
    list_changed: AtomicBool,
}

impl CallContext {
    pub(crate) fn new(
        call_id: CallId,
        tool: Arc<ToolDefinition>,
        arguments: Value,
        session: SessionScope,
        emitter: CallEmitter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            call_id,
            tool,
            arguments,
            session,
            emitter,
            cancel,
            list_changed: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Call identity and arguments
    // ========================================================================

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Definition of the tool being called
    pub fn tool(&self) -> &ToolDefinition {
        &self.tool
    }

    /// Arguments object
    pub fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Mutable arguments, for middlewares that rewrite the request
    pub fn arguments_mut(&mut self) -> &mut Value {
        &mut self.arguments
    }

    /// A single argument by name
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// A single string argument by name
    pub fn argument_str(&self, name: &str) -> Option<&str> {
        self.argument(name).and_then(Value::as_str)
    }

    /// Deserialize the arguments object into a typed struct
    pub fn parse_arguments<T: DeserializeOwned>(&self) -> ToolResult<T> {
        Ok(serde_json::from_value(self.arguments.clone())?)
    }

    // ========================================================================
    // Session state
    // ========================================================================

    /// Read a value from this call's session scope
    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.session.get(key)
    }

    /// Write a value into this call's session scope
    pub fn set_state(&self, key: impl Into<String>, value: Value) {
        self.session.set(key, value);
    }

    pub fn remove_state(&self, key: &str) -> Option<Value> {
        self.session.remove(key)
    }

    pub fn session(&self) -> &SessionScope {
        &self.session
    }

    // ========================================================================
    // Progress and logging
    // ========================================================================

    /// Report progress to the caller; dropped silently if nobody listens
    pub fn report_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> bool {
        self.emitter.emit_progress(progress, total, message)
    }

    /// Send a log record to the caller
    pub fn log(&self, level: &str, message: impl Into<String>, extra: Option<Value>) -> bool {
        self.emitter.emit_log(level, message, extra)
    }

    pub fn debug(&self, message: impl Into<String>) -> bool {
        self.log("debug", message, None)
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.log("info", message, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> bool {
        self.log("warning", message, None)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.log("error", message, None)
    }

    // ========================================================================
    // Cancellation and list refresh
    // ========================================================================

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until the call is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Ask the engine to broadcast list-changed once this call succeeds
    pub fn request_list_changed(&self) {
        self.list_changed.store(true, Ordering::SeqCst);
    }

    pub fn list_changed_requested(&self) -> bool {
        self.list_changed.load(Ordering::SeqCst)
    }

    /// A context backed by a private session store, for unit tests
    #[cfg(test)]
    pub(crate) fn for_test(tool: ToolDefinition, arguments: Value) -> Self {
        use crate::logging::NoOpLogger;
        use crate::session::SessionStore;

        let store = Arc::new(SessionStore::new());
        let call_id = CallId(0);
        Self::new(
            call_id,
            Arc::new(tool),
            arguments,
            store.open(call_id),
            CallEmitter::detached(Arc::new(NoOpLogger::new())),
            CancellationToken::new(),
        )
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("call_id", &self.call_id)
            .field("tool", &self.tool.name)
            .field("arguments", &self.arguments)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
