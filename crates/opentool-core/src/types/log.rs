//! Log messages forwarded from a running tool to the client

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A log record emitted by a tool during a call
///
/// `level` is the remote level name (`"debug"`, `"info"`, `"warning"`, ...);
/// clients map it to a local severity with a `LogLevelMap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl LogMessage {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            logger: None,
            message: message.into(),
            extra: None,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}
