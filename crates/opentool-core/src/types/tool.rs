//! Tool definition types

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Reserved metadata key: tool version string
pub const META_VERSION: &str = "version";

/// Reserved metadata key: tool author
pub const META_AUTHOR: &str = "author";

/// Reserved metadata key under which published definitions expose their tags
///
/// Clients that only read `metadata` find the tag list at
/// `metadata["_opentool"]["tags"]`.
pub const META_NAMESPACE: &str = "_opentool";

fn default_enabled() -> bool {
    true
}

fn default_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Definition of a registered tool
///
/// Identity is the `name`. Apart from the `enabled` flag, a definition is
/// never changed after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema describing the accepted arguments
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: Value,
    /// Free-form tags used for filtering and policy
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Open key/value metadata (see the `META_*` reserved keys)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Disabled tools are hidden from discovery and refuse calls
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ToolDefinition {
    /// Create an enabled tool that accepts an empty object
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: default_schema(),
            tags: BTreeSet::new(),
            metadata: Map::new(),
            enabled: true,
        }
    }

    /// Set the input schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Add a single tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Add several tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check whether the tool carries a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Value of the reserved `version` metadata key
    pub fn version(&self) -> Option<&str> {
        self.metadata.get(META_VERSION).and_then(Value::as_str)
    }

    /// Value of the reserved `author` metadata key
    pub fn author(&self) -> Option<&str> {
        self.metadata.get(META_AUTHOR).and_then(Value::as_str)
    }

    /// Argument names listed under `required` in the input schema
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Copy of this definition as served to clients
    ///
    /// Tags are mirrored into `metadata["_opentool"]["tags"]`.
    pub fn published(&self) -> Self {
        let mut published = self.clone();
        let tags: Vec<&String> = self.tags.iter().collect();
        published
            .metadata
            .insert(META_NAMESPACE.to_string(), json!({ "tags": tags }));
        published
    }

    /// Tags read back from the published metadata namespace
    pub fn published_tags(&self) -> Vec<String> {
        self.metadata
            .get(META_NAMESPACE)
            .and_then(|ns| ns.get("tags"))
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
