//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::ClientConfig;
use super::traits::{ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<ClientConfig>,
}

impl MemoryConfigProvider {
    /// Create a provider holding the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding `config`
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn load(&self) -> ConfigResult<ClientConfig> {
        Ok(self.config.read().clone())
    }

    async fn save(&self, config: &ClientConfig) -> ConfigResult<()> {
        config.validate()?;
        *self.config.write() = config.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_config_provider() {
        let provider = MemoryConfigProvider::new();
        assert_eq!(provider.load().await.unwrap(), ClientConfig::default());

        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(2))
            .with_header("Authorization", "Bearer token");
        provider.save(&config).await.unwrap();

        let loaded = provider.load().await.unwrap();
        assert_eq!(loaded.timeout(), Some(Duration::from_secs(2)));
        assert_eq!(loaded.auth_headers["Authorization"], "Bearer token");
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let provider = MemoryConfigProvider::new();
        let config = ClientConfig::default().with_endpoint("");
        assert!(provider.save(&config).await.is_err());
    }
}
