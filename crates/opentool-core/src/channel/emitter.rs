//! Per-call progress and log streams

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::logging::Logger;
use crate::types::{LogMessage, ProgressEvent};

/// Producer side of a call's progress and log streams
///
/// Emission never blocks and never fails the tool: if nobody consumes the
/// stream the event is dropped.
pub struct CallEmitter {
    progress: mpsc::UnboundedSender<ProgressEvent>,
    logs: mpsc::UnboundedSender<LogMessage>,
    last_progress: Mutex<Option<f64>>,
    logger: Arc<dyn Logger>,
}

/// Consumer side of a call's progress and log streams
pub struct CallEvents {
    pub progress: mpsc::UnboundedReceiver<ProgressEvent>,
    pub logs: mpsc::UnboundedReceiver<LogMessage>,
}

/// Create a connected emitter / events pair for one call
pub fn call_channel(logger: Arc<dyn Logger>) -> (CallEmitter, CallEvents) {
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (logs_tx, logs_rx) = mpsc::unbounded_channel();

    let emitter = CallEmitter {
        progress: progress_tx,
        logs: logs_tx,
        last_progress: Mutex::new(None),
        logger,
    };
    let events = CallEvents {
        progress: progress_rx,
        logs: logs_rx,
    };
    (emitter, events)
}

impl CallEmitter {
    /// An emitter with no consumer attached; every event is dropped
    pub fn detached(logger: Arc<dyn Logger>) -> Self {
        let (emitter, _events) = call_channel(logger);
        emitter
    }

    /// Whether a consumer is still attached to the progress stream
    pub fn has_consumer(&self) -> bool {
        !self.progress.is_closed()
    }

    /// Report progress; returns `true` if the event was delivered
    pub fn emit_progress(
        &self,
        progress: f64,
        total: Option<f64>,
        message: Option<String>,
    ) -> bool {
        self.emit(ProgressEvent {
            progress,
            total,
            message,
        })
    }

    /// Report a progress event; returns `true` if it was delivered
    ///
    /// Events that would move progress backwards are dropped.
    pub fn emit(&self, event: ProgressEvent) -> bool {
        if event.progress.is_nan() {
            self.logger.warn("[CallEmitter] Dropping progress event with NaN progress");
            return false;
        }

        {
            let mut last = self.last_progress.lock();
            if let Some(previous) = *last {
                if event.progress < previous {
                    self.logger.warn(&format!(
                        "[CallEmitter] Dropping progress {} (last reported {})",
                        event.progress, previous
                    ));
                    return false;
                }
            }
            *last = Some(event.progress);
        }

        self.progress.send(event).is_ok()
    }

    /// Forward a log record; returns `true` if it was delivered
    pub fn emit_log(&self, level: &str, message: impl Into<String>, extra: Option<Value>) -> bool {
        let mut record = LogMessage::new(level, message);
        record.extra = extra;
        self.emit_log_message(record)
    }

    /// Forward a prepared log record
    pub fn emit_log_message(&self, message: LogMessage) -> bool {
        self.logs.send(message).is_ok()
    }
}

impl std::fmt::Debug for CallEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallEmitter")
            .field("has_consumer", &self.has_consumer())
            .field("last_progress", &*self.last_progress.lock())
            .finish()
    }
}
