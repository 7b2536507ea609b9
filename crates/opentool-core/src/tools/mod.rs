//! Tool registry module
//!
//! Holds tool definitions together with their handlers. The registry is the
//! only state shared across calls; reads and writes are serialized with a
//! reader-writer lock, and every mutation broadcasts a list-changed
//! notification before returning.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  ToolRegistry                               │
//! │                                             │
//! │  - register / deregister / set_enabled      │
//! │  - list (enabled only, registration order)  │
//! │  - resolve (exact name, disabled included)  │
//! │  - ListChangedNotifier                      │
//! └─────────────────────────────────────────────┘
//!           │
//!           │ resolve(name)
//!           ▼
//! ┌─────────────────────────────────────────────┐
//! │  InvocationEngine → MiddlewareChain → body  │
//! └─────────────────────────────────────────────┘
//! ```

mod handler;
mod registry;

pub use handler::{from_fn, FnHandler, ToolHandler};
pub use registry::{ResolvedTool, ToolFilter, ToolRegistry};
