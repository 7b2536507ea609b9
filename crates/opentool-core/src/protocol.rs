//! Wire messages exchanged between client and server
//!
//! Messages are tagged by method name. Calls are correlated by a
//! client-assigned `CallId`, list requests by a plain request id.
//!
//! ```json
//! {"method": "tools/call", "params": {"call_id": 7, "name": "echo", "arguments": {"text": "hi"}}}
//! {"method": "notifications/progress", "params": {"call_id": 7, "progress": {"progress": 1.0, "total": 3.0}}}
//! {"method": "tools/result", "params": {"call_id": 7, "result": "hi"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorPayload;
use crate::types::{CallId, LogMessage, ProgressEvent, ToolDefinition};

/// Client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ClientRequest {
    #[serde(rename = "tools/list")]
    ListTools { request_id: u64 },

    #[serde(rename = "tools/call")]
    CallTool {
        call_id: CallId,
        name: String,
        #[serde(default)]
        arguments: Value,
    },

    #[serde(rename = "notifications/cancelled")]
    Cancel { call_id: CallId },
}

impl ClientRequest {
    pub fn method(&self) -> &'static str {
        match self {
            ClientRequest::ListTools { .. } => "tools/list",
            ClientRequest::CallTool { .. } => "tools/call",
            ClientRequest::Cancel { .. } => "notifications/cancelled",
        }
    }
}

/// Server -> client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ServerMessage {
    #[serde(rename = "tools/list")]
    Tools {
        request_id: u64,
        tools: Vec<ToolDefinition>,
    },

    #[serde(rename = "tools/result")]
    CallResult { call_id: CallId, result: Value },

    #[serde(rename = "tools/error")]
    CallError { call_id: CallId, error: ErrorPayload },

    #[serde(rename = "notifications/progress")]
    Progress {
        call_id: CallId,
        progress: ProgressEvent,
    },

    #[serde(rename = "notifications/message")]
    Log { call_id: CallId, message: LogMessage },

    #[serde(rename = "notifications/tools/list_changed")]
    ListChanged,
}

impl ServerMessage {
    pub fn method(&self) -> &'static str {
        match self {
            ServerMessage::Tools { .. } => "tools/list",
            ServerMessage::CallResult { .. } => "tools/result",
            ServerMessage::CallError { .. } => "tools/error",
            ServerMessage::Progress { .. } => "notifications/progress",
            ServerMessage::Log { .. } => "notifications/message",
            ServerMessage::ListChanged => "notifications/tools/list_changed",
        }
    }

    /// The call this message belongs to, if any
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            ServerMessage::CallResult { call_id, .. }
            | ServerMessage::CallError { call_id, .. }
            | ServerMessage::Progress { call_id, .. }
            | ServerMessage::Log { call_id, .. } => Some(*call_id),
            ServerMessage::Tools { .. } | ServerMessage::ListChanged => None,
        }
    }
}
