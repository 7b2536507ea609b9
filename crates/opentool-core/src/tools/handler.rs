//! Tool handler trait

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::CallContext;
use crate::error::ToolResult;

/// Body of a tool
///
/// The handler receives the call context, which carries the arguments,
/// the session scope and the progress emitter of this call only.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &CallContext) -> ToolResult<Value>;
}

/// Adapter turning a synchronous closure into a `ToolHandler`
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(&CallContext) -> ToolResult<Value> + Send + Sync,
{
    async fn call(&self, ctx: &CallContext) -> ToolResult<Value> {
        (self.f)(ctx)
    }
}

/// Wrap a synchronous closure as a shared handler
///
/// ```rust,ignore
/// let echo = from_fn(|ctx| Ok(ctx.argument("text").cloned().unwrap_or_default()));
/// ```
pub fn from_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(&CallContext) -> ToolResult<Value> + Send + Sync + 'static,
{
    Arc::new(FnHandler { f })
}
