//! Core data model shared by the registry, engine and client
//!
//! This module contains the protocol-neutral types that travel between
//! components: tool definitions, progress events, log messages and call ids.

mod tool;
mod progress;
mod log;
mod call;
mod cancellation;

pub use tool::{ToolDefinition, META_AUTHOR, META_NAMESPACE, META_VERSION};
pub use progress::ProgressEvent;
pub use log::LogMessage;
pub use call::CallId;
pub use cancellation::CancellationToken;
