//! Middleware trait and ordered chain

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::engine::CallContext;
use crate::error::ToolResult;
use crate::tools::ToolHandler;

/// Interceptor around a tool call
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle a call, usually by doing some work and then `next.run(ctx).await`
    async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Continuation for the rest of the chain
///
/// Consumed by `run`, so a middleware can proceed at most once.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    handler: &'a dyn ToolHandler,
}

impl<'a> Next<'a> {
    /// Run the remaining middlewares and then the tool body
    pub fn run<'c>(self, ctx: &'c mut CallContext) -> BoxFuture<'c, ToolResult<Value>>
    where
        'a: 'c,
    {
        match self.remaining.split_first() {
            Some((head, tail)) => {
                let next = Next {
                    remaining: tail,
                    handler: self.handler,
                };
                head.on_call(ctx, next)
            }
            None => self.handler.call(ctx),
        }
    }
}

/// Ordered, append-only list of middlewares
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs after every middleware already present
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.entries.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the middlewares in execution order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|m| m.name().to_string()).collect()
    }

    /// Run the chain around `handler`
    pub fn run<'c>(
        &'c self,
        ctx: &'c mut CallContext,
        handler: &'c dyn ToolHandler,
    ) -> BoxFuture<'c, ToolResult<Value>> {
        Next {
            remaining: &self.entries,
            handler,
        }
        .run(ctx)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("entries", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CallContext;
    use crate::error::ToolError;
    use crate::tools::from_fn;
    use crate::types::ToolDefinition;
    use parking_lot::Mutex;
    use serde_json::json;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recording {
        label: &'static str,
        trace: Trace,
    }

    #[async_trait]
    impl Middleware for Recording {
        async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value> {
            self.trace.lock().push(format!("{}-pre", self.label));
            let result = next.run(ctx).await;
            self.trace.lock().push(format!("{}-post", self.label));
            result
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn on_call(&self, _ctx: &mut CallContext, _next: Next<'_>) -> ToolResult<Value> {
            Err(ToolError::execution("denied"))
        }
    }

    struct StampUser;

    #[async_trait]
    impl Middleware for StampUser {
        async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value> {
            ctx.set_state("user", json!("alice"));
            next.run(ctx).await
        }
    }

    #[tokio::test]
    async fn test_pre_in_order_post_in_reverse() {
        let trace: Trace = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Recording { label: "M1", trace: trace.clone() }));
        chain.push(Arc::new(Recording { label: "M2", trace: trace.clone() }));

        let body_trace = trace.clone();
        let handler = from_fn(move |_| {
            body_trace.lock().push("body".to_string());
            Ok(json!("done"))
        });

        let mut ctx = CallContext::for_test(ToolDefinition::new("t", "t"), json!({}));
        let result = chain.run(&mut ctx, handler.as_ref()).await.unwrap();

        assert_eq!(result, json!("done"));
        assert_eq!(
            *trace.lock(),
            vec!["M1-pre", "M2-pre", "body", "M2-post", "M1-post"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_body() {
        let trace: Trace = Arc::default();
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(Recording { label: "outer", trace: trace.clone() }));
        chain.push(Arc::new(Deny));

        let body_trace = trace.clone();
        let handler = from_fn(move |_| {
            body_trace.lock().push("body".to_string());
            Ok(json!(null))
        });

        let mut ctx = CallContext::for_test(ToolDefinition::new("t", "t"), json!({}));
        let err = chain.run(&mut ctx, handler.as_ref()).await.unwrap_err();

        assert!(matches!(err, ToolError::Execution(ref m) if m == "denied"));
        assert_eq!(*trace.lock(), vec!["outer-pre", "outer-post"]);
    }

    #[tokio::test]
    async fn test_state_flows_to_body() {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(StampUser));

        let handler = from_fn(|ctx| Ok(ctx.get_state("user").unwrap_or(Value::Null)));

        let mut ctx = CallContext::for_test(ToolDefinition::new("t", "t"), json!({}));
        let result = chain.run(&mut ctx, handler.as_ref()).await.unwrap();
        assert_eq!(result, json!("alice"));
    }

    #[tokio::test]
    async fn test_empty_chain_calls_body() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let handler = from_fn(|ctx| Ok(ctx.arguments().clone()));
        let mut ctx = CallContext::for_test(ToolDefinition::new("t", "t"), json!({ "x": 1 }));
        assert_eq!(chain.run(&mut ctx, handler.as_ref()).await.unwrap(), json!({ "x": 1 }));
    }
}
