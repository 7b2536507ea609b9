//! Client configuration and configuration providers
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigProvider`: In-memory for testing
//! - `FileConfigProvider`: YAML file-based (user/workspace level)

mod settings;
mod traits;
mod memory;
mod file;

pub use settings::{ClientConfig, DEFAULT_ENDPOINT};
pub use traits::{ConfigProvider, ConfigError, ConfigResult};
pub use memory::MemoryConfigProvider;
pub use file::{FileConfigProvider, ConfigLevel};
