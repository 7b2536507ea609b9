//! Tool registry for managing invocable tools
//!
//! The ToolRegistry is the central component for:
//! - Registering and deregistering tools at runtime
//! - Enabling and disabling tools
//! - Listing tools for discovery (enabled only, registration order)
//! - Resolving tools by exact name for invocation

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;

use super::handler::ToolHandler;
use crate::channel::{ListChangedNotifier, ListChangedReceiver};
use crate::error::{ToolError, ToolResult};
use crate::logging::Logger;
use crate::types::ToolDefinition;

/// A tool resolved by name: its definition and its body
#[derive(Clone)]
pub struct ResolvedTool {
    pub definition: Arc<ToolDefinition>,
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for ResolvedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedTool")
            .field("definition", &self.definition)
            .finish()
    }
}

/// Filter for tool discovery
#[derive(Debug, Clone)]
pub struct ToolFilter {
    /// If set, only include tools carrying at least one of these tags
    pub include_tags: Option<BTreeSet<String>>,
    /// Exclude tools carrying any of these tags
    pub exclude_tags: BTreeSet<String>,
    /// Only include enabled tools (default: true)
    pub only_enabled: bool,
}

impl Default for ToolFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolFilter {
    pub fn new() -> Self {
        Self {
            include_tags: None,
            exclude_tags: BTreeSet::new(),
            only_enabled: true,
        }
    }

    /// Include all tools, disabled ones too
    pub fn all() -> Self {
        Self {
            only_enabled: false,
            ..Self::new()
        }
    }

    /// Include only tools with one of these tags
    pub fn with_include_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.include_tags = Some(tags.into_iter().collect());
        self
    }

    /// Exclude tools with any of these tags
    pub fn with_exclude_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.exclude_tags = tags.into_iter().collect();
        self
    }

    /// Check if a tool matches this filter
    pub fn matches(&self, tool: &ToolDefinition) -> bool {
        if self.only_enabled && !tool.enabled {
            return false;
        }

        if tool.tags.iter().any(|t| self.exclude_tags.contains(t)) {
            return false;
        }

        if let Some(ref include) = self.include_tags {
            if !tool.tags.iter().any(|t| include.contains(t)) {
                return false;
            }
        }

        true
    }
}

struct RegisteredTool {
    definition: Arc<ToolDefinition>,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of available tools
pub struct ToolRegistry {
    /// Registered tools in registration order
    tools: RwLock<Vec<RegisteredTool>>,
    /// List-changed broadcast
    notifier: ListChangedNotifier,
    /// Logger
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create an empty tool registry
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
            notifier: ListChangedNotifier::new(),
            logger,
        }
    }

    /// Register a tool
    ///
    /// Fails with `DuplicateName` if a tool with the same name exists.
    pub fn register(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> ToolResult<()> {
        let name = definition.name.clone();
        {
            let mut tools = self.tools.write();
            if tools.iter().any(|t| t.definition.name == name) {
                return Err(ToolError::DuplicateName(name));
            }
            tools.push(RegisteredTool {
                definition: Arc::new(definition),
                handler,
            });
        }

        self.logger.info(&format!("[ToolRegistry] Registered tool: {}", name));
        self.notifier.notify();
        Ok(())
    }

    /// Remove a tool
    ///
    /// Fails with `NotFound` if no tool has this name.
    pub fn deregister(&self, name: &str) -> ToolResult<ToolDefinition> {
        let removed = {
            let mut tools = self.tools.write();
            let pos = tools
                .iter()
                .position(|t| t.definition.name == name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            tools.remove(pos)
        };

        self.logger.info(&format!("[ToolRegistry] Deregistered tool: {}", name));
        self.notifier.notify();
        Ok((*removed.definition).clone())
    }

    /// Enable or disable a tool
    ///
    /// Returns whether the flag changed. A notification is only broadcast
    /// when it did.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> ToolResult<bool> {
        let changed = {
            let mut tools = self.tools.write();
            let tool = tools
                .iter_mut()
                .find(|t| t.definition.name == name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

            if tool.definition.enabled == enabled {
                false
            } else {
                let mut updated = (*tool.definition).clone();
                updated.enabled = enabled;
                tool.definition = Arc::new(updated);
                true
            }
        };

        if changed {
            self.logger.info(&format!(
                "[ToolRegistry] Tool {} {}",
                name,
                if enabled { "enabled" } else { "disabled" }
            ));
            self.notifier.notify();
        }
        Ok(changed)
    }

    /// Enabled tools in registration order
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.list_filtered(&ToolFilter::new())
    }

    /// Tools matching a filter, in registration order
    pub fn list_filtered(&self, filter: &ToolFilter) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .iter()
            .filter(|t| filter.matches(&t.definition))
            .map(|t| (*t.definition).clone())
            .collect()
    }

    /// Look up a tool by exact name, whether enabled or not
    pub fn resolve(&self, name: &str) -> ToolResult<ResolvedTool> {
        self.tools
            .read()
            .iter()
            .find(|t| t.definition.name == name)
            .map(|t| ResolvedTool {
                definition: Arc::clone(&t.definition),
                handler: Arc::clone(&t.handler),
            })
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().iter().any(|t| t.definition.name == name)
    }

    /// Subscribe to list-changed notifications
    pub fn subscribe(&self) -> ListChangedReceiver {
        self.notifier.subscribe()
    }

    /// Broadcast a list-changed notification without mutating the registry
    pub fn notify_list_changed(&self) -> usize {
        self.logger.debug("[ToolRegistry] Broadcasting list-changed notification");
        self.notifier.notify()
    }

    /// Get count of registered tools
    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }

    /// Get count of enabled tools
    pub fn enabled_tool_count(&self) -> usize {
        self.tools.read().iter().filter(|t| t.definition.enabled).count()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .tools
            .read()
            .iter()
            .map(|t| t.definition.name.clone())
            .collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::tools::from_fn;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(NoOpLogger::new()))
    }

    fn noop_handler() -> Arc<dyn ToolHandler> {
        from_fn(|_| Ok(json!(null)))
    }

    #[test]
    fn test_list_in_registration_order_excluding_disabled() {
        let registry = registry();
        registry.register(ToolDefinition::new("zeta", "z"), noop_handler()).unwrap();
        registry
            .register(ToolDefinition::new("hello", "h").with_enabled(false), noop_handler())
            .unwrap();
        registry.register(ToolDefinition::new("alpha", "a"), noop_handler()).unwrap();

        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(registry.tool_count(), 3);
        assert_eq!(registry.enabled_tool_count(), 2);

        // Disabled tools are still resolvable by exact name
        let hello = registry.resolve("hello").unwrap();
        assert!(!hello.definition.enabled);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = registry();
        registry.register(ToolDefinition::new("echo", "e"), noop_handler()).unwrap();

        let err = registry
            .register(ToolDefinition::new("echo", "again"), noop_handler())
            .unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(registry.tool_count(), 1);
    }

    #[test]
    fn test_deregister_emits_exactly_one_notification() {
        let registry = registry();
        registry.register(ToolDefinition::new("echo", "e"), noop_handler()).unwrap();

        let mut rx = registry.subscribe();
        let removed = registry.deregister("echo").unwrap();
        assert_eq!(removed.name, "echo");

        assert!(rx.try_recv().is_ok());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert!(matches!(registry.resolve("echo"), Err(ToolError::NotFound(_))));
        assert!(matches!(registry.deregister("echo"), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn test_register_notifies() {
        let registry = registry();
        let mut rx = registry.subscribe();
        registry.register(ToolDefinition::new("echo", "e"), noop_handler()).unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_set_enabled_notifies_only_on_change() {
        let registry = registry();
        registry.register(ToolDefinition::new("echo", "e"), noop_handler()).unwrap();
        let mut rx = registry.subscribe();

        assert!(!registry.set_enabled("echo", true).unwrap());
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        assert!(registry.set_enabled("echo", false).unwrap());
        assert!(rx.try_recv().is_ok());
        assert!(registry.list().is_empty());

        assert!(matches!(registry.set_enabled("missing", true), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn test_tool_filter_default() {
        let filter = ToolFilter::new();

        let enabled = ToolDefinition::new("fruit_processor", "Process fruit").with_tag("test");
        let disabled = ToolDefinition::new("hello", "Say hello").with_enabled(false);

        assert!(filter.matches(&enabled));
        assert!(!filter.matches(&disabled));
        assert!(ToolFilter::all().matches(&disabled));
    }

    #[test]
    fn test_tool_filter_tags() {
        let test_tool = ToolDefinition::new("a", "a").with_tag("test");
        let prod_tool = ToolDefinition::new("b", "b").with_tag("prod");
        let untagged = ToolDefinition::new("c", "c");

        let include = ToolFilter::new().with_include_tags(["test".to_string()]);
        assert!(include.matches(&test_tool));
        assert!(!include.matches(&prod_tool));
        assert!(!include.matches(&untagged));

        let exclude = ToolFilter::new().with_exclude_tags(["test".to_string()]);
        assert!(!exclude.matches(&test_tool));
        assert!(exclude.matches(&prod_tool));
        assert!(exclude.matches(&untagged));
    }

    #[test]
    fn test_list_filtered_keeps_order() {
        let registry = registry();
        registry.register(ToolDefinition::new("one", "1").with_tag("x"), noop_handler()).unwrap();
        registry.register(ToolDefinition::new("two", "2"), noop_handler()).unwrap();
        registry.register(ToolDefinition::new("three", "3").with_tag("x"), noop_handler()).unwrap();

        let filter = ToolFilter::new().with_include_tags(["x".to_string()]);
        let names: Vec<String> = registry
            .list_filtered(&filter)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["one", "three"]);
    }
}
