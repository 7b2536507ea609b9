//! Middlewares shipped with the crate

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use super::chain::{Middleware, Next};
use crate::engine::CallContext;
use crate::error::{ToolError, ToolResult};
use crate::logging::Logger;

/// Logs start, finish and failure of every call
pub struct LoggingMiddleware {
    logger: Arc<dyn Logger>,
}

impl LoggingMiddleware {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value> {
        let call_id = ctx.call_id();
        let tool = ctx.tool().name.clone();
        let started = Instant::now();

        self.logger.info(&format!("[LoggingMiddleware] {} {} started", call_id, tool));
        let result = next.run(ctx).await;

        match &result {
            Ok(_) => self.logger.info(&format!(
                "[LoggingMiddleware] {} {} finished in {:?}",
                call_id,
                tool,
                started.elapsed()
            )),
            Err(e) => self.logger.warn(&format!(
                "[LoggingMiddleware] {} {} failed: {}",
                call_id, tool, e
            )),
        }
        result
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Rejects calls to tools carrying a denied tag
#[derive(Debug, Clone, Default)]
pub struct TagPolicyMiddleware {
    denied: BTreeSet<String>,
}

impl TagPolicyMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny tools tagged with `tag`
    pub fn deny(mut self, tag: impl Into<String>) -> Self {
        self.denied.insert(tag.into());
        self
    }

    pub fn denied_tags(&self) -> impl Iterator<Item = &str> {
        self.denied.iter().map(String::as_str)
    }
}

#[async_trait]
impl Middleware for TagPolicyMiddleware {
    async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value> {
        let blocked = ctx
            .tool()
            .tags
            .iter()
            .find(|tag| self.denied.contains(*tag))
            .cloned();

        if let Some(tag) = blocked {
            return Err(ToolError::execution(format!(
                "tool '{}' is blocked by tag policy: {}",
                ctx.tool().name,
                tag
            )));
        }
        next.run(ctx).await
    }

    fn name(&self) -> &str {
        "tag_policy"
    }
}
