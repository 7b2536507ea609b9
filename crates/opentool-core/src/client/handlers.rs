//! Client-side callbacks for progress, log and notification messages

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::ClientConfig;
use crate::logging::{LogLevelMap, Logger};
use crate::types::{CallId, LogMessage, ProgressEvent, ToolDefinition};

/// Receives progress events of one call, in emission order
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn on_progress(&self, event: &ProgressEvent);
}

#[async_trait]
impl<F> ProgressHandler for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    async fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Receives log records sent by tools for the whole connection
#[async_trait]
pub trait LogHandler: Send + Sync {
    async fn on_log(&self, call_id: CallId, message: &LogMessage);
}

#[async_trait]
impl<F> LogHandler for F
where
    F: Fn(CallId, &LogMessage) + Send + Sync,
{
    async fn on_log(&self, call_id: CallId, message: &LogMessage) {
        self(call_id, message)
    }
}

/// Receives server notifications that are not tied to a call
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// The set of available tools changed
    async fn on_tool_list_changed(&self) {}
}

/// Forwards tool log records to a local `Logger`
///
/// Remote level names are mapped through a `LogLevelMap`; unknown names
/// are logged at info.
pub struct LoggerLogHandler {
    logger: Arc<dyn Logger>,
    levels: LogLevelMap,
}

impl LoggerLogHandler {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            levels: LogLevelMap::new(),
        }
    }

    /// Use the level overrides from `config`
    pub fn from_config(logger: Arc<dyn Logger>, config: &ClientConfig) -> Self {
        Self {
            logger,
            levels: config.level_map(),
        }
    }

    pub fn with_levels(mut self, levels: LogLevelMap) -> Self {
        self.levels = levels;
        self
    }
}

#[async_trait]
impl LogHandler for LoggerLogHandler {
    async fn on_log(&self, call_id: CallId, message: &LogMessage) {
        let level = self.levels.resolve(&message.level);
        let source = message.logger.as_deref().unwrap_or("server");

        let line = match &message.extra {
            Some(extra) => format!("[{}] {}: {} {}", call_id, source, message.message, extra),
            None => format!("[{}] {}: {}", call_id, source, message.message),
        };
        self.logger.log(level, &line);
    }
}

/// Cache of the last tool listing, cleared on list-changed
#[derive(Debug, Default)]
pub struct ToolCache {
    tools: RwLock<Option<Vec<ToolDefinition>>>,
    invalidations: AtomicUsize,
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a listing
    pub fn store(&self, tools: Vec<ToolDefinition>) {
        *self.tools.write() = Some(tools);
    }

    /// The cached listing, if still valid
    pub fn get(&self) -> Option<Vec<ToolDefinition>> {
        self.tools.read().clone()
    }

    pub fn is_valid(&self) -> bool {
        self.tools.read().is_some()
    }

    /// How many times the cache was cleared by a notification
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        *self.tools.write() = None;
    }
}

#[async_trait]
impl MessageHandler for ToolCache {
    async fn on_tool_list_changed(&self) {
        self.clear();
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger};
    use parking_lot::Mutex;
    use serde_json::json;

    #[tokio::test]
    async fn test_closure_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = move |event: &ProgressEvent| sink.lock().push(event.progress);

        handler.on_progress(&ProgressEvent::new(1.0)).await;
        handler.on_progress(&ProgressEvent::new(2.0)).await;
        assert_eq!(*seen.lock(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_logger_log_handler_maps_levels() {
        let logger = Arc::new(MemoryLogger::new());
        let config = ClientConfig::default().with_log_level("notice", LogLevel::Warn);
        let handler = LoggerLogHandler::from_config(logger.clone(), &config);

        handler
            .on_log(CallId(1), &LogMessage::new("notice", "heads up"))
            .await;
        handler
            .on_log(
                CallId(1),
                &LogMessage::new("WARNING", "Skipping banana")
                    .with_extra(json!({ "item": "banana" })),
            )
            .await;
        handler
            .on_log(CallId(2), &LogMessage::new("verbose", "unknown level").with_logger("fruit"))
            .await;

        assert_eq!(logger.messages_at(LogLevel::Warn).len(), 2);
        assert!(logger.contains("Skipping banana {\"item\":\"banana\"}"));
        assert_eq!(
            logger.messages_at(LogLevel::Info),
            vec!["[call-2] fruit: unknown level".to_string()]
        );
    }

    #[tokio::test]
    async fn test_tool_cache_clears_on_list_changed() {
        let cache = ToolCache::new();
        assert!(!cache.is_valid());

        cache.store(vec![ToolDefinition::new("echo", "e")]);
        assert_eq!(cache.get().unwrap().len(), 1);

        cache.on_tool_list_changed().await;
        assert!(cache.get().is_none());
        assert_eq!(cache.invalidations(), 1);
    }
}
