//! Middleware chain wrapped around every tool invocation
//!
//! Middlewares run in registration order on the way in and in reverse order
//! on the way out. Each one receives the call context and a `Next`
//! continuation; not calling `next.run(ctx)` short-circuits the call.
//!
//! ```rust,ignore
//! struct Audit;
//!
//! #[async_trait]
//! impl Middleware for Audit {
//!     async fn on_call(&self, ctx: &mut CallContext, next: Next<'_>) -> ToolResult<Value> {
//!         ctx.set_state("audited", json!(true));
//!         next.run(ctx).await
//!     }
//! }
//! ```

mod chain;
mod builtin;

pub use chain::{Middleware, MiddlewareChain, Next};
pub use builtin::{LoggingMiddleware, TagPolicyMiddleware};
