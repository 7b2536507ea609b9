//! Client facade
//!
//! `Client` wraps a `Transport` connection: it lists tools, calls them with
//! optional progress handlers and timeouts, and routes server-side log
//! records and list-changed notifications to registered handlers.

#[allow(clippy::module_inception)]
mod client;
mod handlers;

pub use client::{CallOptions, Client};
pub use handlers::{LogHandler, LoggerLogHandler, MessageHandler, ProgressHandler, ToolCache};
