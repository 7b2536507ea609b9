//! Demo tools: `fruit_processor` and `hello`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentool_core::{from_fn, CallContext, ToolDefinition, ToolHandler, ToolRegistry, ToolResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct FruitArgs {
    fruits: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct FruitReport {
    processed: Vec<String>,
    unprocessed: Vec<String>,
}

/// Processes each fruit after a delay, reporting progress per item
///
/// Bananas are never processed.
pub struct FruitProcessor {
    delay: Duration,
}

impl FruitProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new("fruit_processor", "tool to process items with progress updates")
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "fruits": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["fruits"]
            }))
            .with_tag("test")
            .with_meta("version", "1.2")
            .with_meta("author", "Mark")
    }
}

#[async_trait]
impl ToolHandler for FruitProcessor {
    async fn call(&self, ctx: &CallContext) -> ToolResult<Value> {
        let args: FruitArgs = ctx.parse_arguments()?;
        let total = args.fruits.len() as f64;
        let mut report = FruitReport::default();

        for (i, fruit) in args.fruits.iter().enumerate() {
            ctx.report_progress(
                i as f64,
                Some(total),
                Some(format!("Processing fruit {} of {}", i + 1, args.fruits.len())),
            );
            tokio::time::sleep(self.delay).await;

            if fruit == "banana" {
                ctx.log("warning", format!("skipped {}", fruit), Some(json!({ "item": fruit })));
                report.unprocessed.push(fruit.to_uppercase());
            } else {
                ctx.info(format!("processed {}", fruit));
                report.processed.push(fruit.to_uppercase());
            }
        }

        ctx.report_progress(total, Some(total), None);
        Ok(serde_json::to_value(report)?)
    }
}

/// Register the demo tools; `hello` starts disabled
pub fn register_demo_tools(registry: &ToolRegistry, delay: Duration) -> ToolResult<()> {
    registry.register(FruitProcessor::definition(), Arc::new(FruitProcessor::new(delay)))?;

    let hello = ToolDefinition::new("hello", "just a simple hello")
        .with_schema(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .with_tag("test")
        .with_meta("version", "1.2")
        .with_meta("author", "Mark")
        .with_enabled(false);
    registry.register(
        hello,
        from_fn(|ctx| {
            let name = ctx.argument_str("name").unwrap_or("stranger");
            Ok(json!(format!("Hello, {}!", name)))
        }),
    )
}
