//! Logging abstractions for runtime-agnostic logging
//!
//! Components receive an `Arc<dyn Logger>` instead of writing to a global
//! sink. Remote log levels (as sent by tools) are mapped to local
//! severities through `LogLevelMap`.

mod traits;
mod level;
mod noop;
mod console;
mod memory;

pub use traits::{Logger, SharedLogger};
pub use level::{LogLevel, LogLevelMap};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::MemoryLogger;
