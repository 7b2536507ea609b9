//! OpenTool Core
//!
//! Runtime-agnostic core of an RPC tool-invocation protocol.
//! A server exposes named tools; clients discover them, invoke them with
//! JSON arguments and receive results, progress updates, log records and
//! list-changed notifications.
//!
//! ## Server side
//!
//! - `tools`: registry of tool definitions and handlers
//! - `middleware`: ordered interceptors around every call
//! - `engine`: resolves, validates and runs calls with a fresh `CallContext`
//! - `session`: per-call key/value state, released when the call ends
//! - `channel`: per-call progress/log streams and list-changed broadcast
//! - `server`: serves wire requests for one connection
//!
//! ## Client side
//!
//! - `client`: connect, list and call with progress handlers and timeouts
//! - `transport`: connection abstraction, with an in-process implementation
//!
//! ```rust,ignore
//! use opentool_core::{Client, ClientConfig, InvocationEngine, LocalTransport, ToolDefinition, ToolRegistry};
//!
//! let registry = Arc::new(ToolRegistry::new(logger.clone()));
//! registry.register(ToolDefinition::new("echo", "Echo text"), from_fn(|ctx| Ok(ctx.arguments().clone())))?;
//!
//! let engine = Arc::new(InvocationEngine::new(registry, logger));
//! let client = Client::new(Arc::new(LocalTransport::new(engine)), ClientConfig::default());
//! client.connect().await?;
//! let result = client.call_tool("echo", json!({"text": "hi"}), CallOptions::new()).await?;
//! ```

pub mod types;
pub mod error;
pub mod logging;
pub mod config;
pub mod channel;
pub mod session;
pub mod tools;
pub mod middleware;
pub mod engine;
pub mod protocol;
pub mod server;
pub mod transport;
pub mod client;

// Re-export commonly used types
pub use types::{CallId, CancellationToken, LogMessage, ProgressEvent, ToolDefinition};

pub use error::{ErrorKind, ErrorPayload, ToolError, ToolResult};

pub use logging::{ConsoleLogger, LogLevel, Logger, NoOpLogger};

pub use config::{ClientConfig, ConfigProvider, FileConfigProvider, MemoryConfigProvider};

pub use tools::{from_fn, ToolFilter, ToolHandler, ToolRegistry};

pub use middleware::{LoggingMiddleware, Middleware, MiddlewareChain, Next, TagPolicyMiddleware};

pub use engine::{CallContext, EngineBuilder, InvocationEngine};

pub use session::{SessionScope, SessionStore};

pub use protocol::{ClientRequest, ServerMessage};

pub use server::ToolServer;

pub use transport::{Connection, LocalTransport, Transport};

pub use client::{
    CallOptions, Client, LogHandler, LoggerLogHandler, MessageHandler, ProgressHandler, ToolCache,
};
