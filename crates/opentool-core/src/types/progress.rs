//! Progress event types

use serde::{Deserialize, Serialize};

/// A unit of incremental status reported by a running tool
///
/// `total` is optional: open-ended work reports only a running count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Amount of work done so far
    pub progress: f64,
    /// Total amount of work, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Optional human-readable status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Create an open-ended progress event
    pub fn new(progress: f64) -> Self {
        Self {
            progress,
            total: None,
            message: None,
        }
    }

    /// Set the total
    pub fn with_total(mut self, total: f64) -> Self {
        self.total = Some(total);
        self
    }

    /// Set the status message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Completion percentage, if a non-zero total is known
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0.0 => Some(self.progress / total * 100.0),
            _ => None,
        }
    }

    /// Whether this is the terminal event (`progress == total`)
    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|total| self.progress >= total)
    }
}
