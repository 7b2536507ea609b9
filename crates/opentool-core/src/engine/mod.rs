//! Invocation engine
//!
//! Resolves a tool by name, validates its arguments, builds a fresh
//! `CallContext` and runs it through the middleware chain into the tool
//! body. Every call moves through an explicit `CallState` lifecycle.

mod context;
#[allow(clippy::module_inception)]
mod engine;
mod state;

pub use context::CallContext;
pub use engine::{EngineBuilder, InvocationEngine};
pub use state::{CallState, CallTracker};
