//! Configuration provider trait

use async_trait::async_trait;

use super::settings::ClientConfig;

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: Reads from YAML file (~/.config/opentool/config.yaml)
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load the client configuration
    async fn load(&self) -> ConfigResult<ClientConfig>;

    /// Persist the client configuration
    async fn save(&self, config: &ClientConfig) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
