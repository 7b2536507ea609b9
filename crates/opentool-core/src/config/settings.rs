//! Client configuration structure

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};
use crate::logging::{LogLevel, LogLevelMap};

/// Endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/tools";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Options recognised by the client facade
///
/// ```yaml
/// transport_endpoint: http://localhost:8000/tools
/// auth_headers:
///   Authorization: Bearer your-token-here
/// timeout_ms: 30000
/// log_level_map:
///   notice: warn
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Where the transport connects
    #[serde(default = "default_endpoint")]
    pub transport_endpoint: String,

    /// Headers handed to the transport untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auth_headers: BTreeMap<String, String>,

    /// Default per-call timeout in milliseconds (none = wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Overrides for mapping remote log level names to local levels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub log_level_map: BTreeMap<String, LogLevel>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport_endpoint: default_endpoint(),
            auth_headers: BTreeMap::new(),
            timeout_ms: None,
            log_level_map: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.transport_endpoint = endpoint.into();
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_headers.insert(name.into(), value.into());
        self
    }

    /// Set the default per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        // Rounded up so a sub-millisecond timeout never becomes zero
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Map a remote level name to a local level
    pub fn with_log_level(mut self, remote: impl Into<String>, level: LogLevel) -> Self {
        self.log_level_map.insert(remote.into(), level);
        self
    }

    /// Default per-call timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Level map with the configured overrides applied to the defaults
    pub fn level_map(&self) -> LogLevelMap {
        LogLevelMap::with_overrides(&self.log_level_map)
    }

    /// Check the configuration for values no transport could use
    pub fn validate(&self) -> ConfigResult<()> {
        if self.transport_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("transport_endpoint is empty".to_string()));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.auth_headers.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "auth_headers contains an empty header name".to_string(),
            ));
        }
        Ok(())
    }
}
