//! Lifecycle of a single invocation

use std::sync::Arc;

use crate::logging::Logger;
use crate::types::CallId;

/// Where an invocation is in its lifecycle
///
/// ```text
/// Pending -> Resolving -> Executing -> Completed
///                 |            |
///                 +-> Failed <-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Resolving,
    Executing,
    Completed,
    Failed,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Pending => "pending",
            CallState::Resolving => "resolving",
            CallState::Executing => "executing",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Completed | CallState::Failed)
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: CallState) -> bool {
        matches!(
            (self, next),
            (CallState::Pending, CallState::Resolving)
                | (CallState::Resolving, CallState::Executing)
                | (CallState::Resolving, CallState::Failed)
                | (CallState::Executing, CallState::Completed)
                | (CallState::Executing, CallState::Failed)
        )
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of one invocation
pub struct CallTracker {
    call_id: CallId,
    tool: String,
    state: CallState,
    logger: Arc<dyn Logger>,
}

impl CallTracker {
    pub fn new(call_id: CallId, tool: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self {
            call_id,
            tool: tool.into(),
            state: CallState::Pending,
            logger,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Move to `next`; invalid transitions are logged and ignored
    pub fn advance(&mut self, next: CallState) -> bool {
        if !self.state.can_transition_to(next) {
            self.logger.error(&format!(
                "[InvocationEngine] {} {}: invalid transition {} -> {}",
                self.call_id, self.tool, self.state, next
            ));
            return false;
        }

        self.logger.debug(&format!(
            "[InvocationEngine] {} {}: {} -> {}",
            self.call_id, self.tool, self.state, next
        ));
        self.state = next;
        true
    }
}
