//! Error taxonomy for tool registration and invocation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while registering, resolving or calling tools
#[derive(Error, Debug)]
pub enum ToolError {
    /// No tool with this name is registered
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The tool exists but is disabled
    #[error("Tool is disabled: {0}")]
    ToolDisabled(String),

    /// A tool with this name is already registered
    #[error("Tool already registered: {0}")]
    DuplicateName(String),

    /// The tool body (or a middleware) failed
    #[error("Tool execution failed: {0}")]
    Execution(String),

    /// The call exceeded its deadline
    #[error("Call timed out: {0}")]
    Timeout(String),

    /// The call was cancelled before it finished
    #[error("Call cancelled: {0}")]
    Cancelled(String),

    /// Connectivity problem between client and server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Arguments or results could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Stable error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::ToolDisabled(_) => ErrorKind::ToolDisabled,
            ToolError::DuplicateName(_) => ErrorKind::DuplicateName,
            ToolError::Execution(_) | ToolError::Serialization(_) => ErrorKind::Execution,
            ToolError::Timeout(_) => ErrorKind::Timeout,
            ToolError::Cancelled(_) => ErrorKind::Cancelled,
            ToolError::Transport(_) => ErrorKind::Transport,
        }
    }

    /// The message without the kind prefix
    pub fn detail(&self) -> String {
        match self {
            ToolError::NotFound(m)
            | ToolError::ToolDisabled(m)
            | ToolError::DuplicateName(m)
            | ToolError::Execution(m)
            | ToolError::Timeout(m)
            | ToolError::Cancelled(m)
            | ToolError::Transport(m) => m.clone(),
            ToolError::Serialization(e) => e.to_string(),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Kind of a failure, as surfaced to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ToolDisabled,
    DuplicateName,
    Execution,
    Timeout,
    Cancelled,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ToolDisabled => "tool_disabled",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::Execution => "execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of a failed call: kind + message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ToolError> for ErrorPayload {
    fn from(err: &ToolError) -> Self {
        Self {
            kind: err.kind(),
            message: err.detail(),
        }
    }
}

impl From<ErrorPayload> for ToolError {
    fn from(payload: ErrorPayload) -> Self {
        let message = payload.message;
        match payload.kind {
            ErrorKind::NotFound => ToolError::NotFound(message),
            ErrorKind::ToolDisabled => ToolError::ToolDisabled(message),
            ErrorKind::DuplicateName => ToolError::DuplicateName(message),
            ErrorKind::Execution => ToolError::Execution(message),
            ErrorKind::Timeout => ToolError::Timeout(message),
            ErrorKind::Cancelled => ToolError::Cancelled(message),
            ErrorKind::Transport => ToolError::Transport(message),
        }
    }
}
