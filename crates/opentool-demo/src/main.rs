//! OpenTool demo
//!
//! Runs a tool server and a client in one process over `LocalTransport`:
//! lists the available tools, then calls each one that is enabled while
//! printing progress as it arrives.
//!
//! Environment:
//! - `OPENTOOL_DEMO_DELAY_MS`: per-fruit processing delay (default 500)

mod fruit;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use opentool_core::{
    CallOptions, Client, ClientConfig, ConfigProvider, ConsoleLogger, FileConfigProvider,
    InvocationEngine, LocalTransport, LogLevel, Logger, LoggerLogHandler, LoggingMiddleware,
    ProgressEvent, ToolCache, ToolDefinition, ToolRegistry, ToolResult,
};
use serde_json::json;

const DEFAULT_DELAY_MS: u64 = 500;

fn print_progress(event: &ProgressEvent) {
    let message = event.message.as_deref().unwrap_or("No message provided");
    match event.percentage() {
        Some(percentage) => println!("[Progress] {:.1}% complete - {}", percentage, message),
        None => println!("[Progress] {} units - {}", event.progress, message),
    }
}

fn print_tool(tool: &ToolDefinition) {
    println!("Tool: {}", tool.name);
    println!("Description: {}", tool.description);
    println!("Parameters: {}", tool.input_schema);
    println!("Tags: {:?}", tool.published_tags());
    if let (Some(version), Some(author)) = (tool.version(), tool.author()) {
        println!("Version: {} by {}", version, author);
    }
    println!("------------------");
}

async fn load_config(logger: &Arc<dyn Logger>) -> ClientConfig {
    let provider = match env::current_dir() {
        Ok(dir) => FileConfigProvider::workspace(dir),
        Err(_) => FileConfigProvider::user(),
    };
    let provider = if provider.exists() { provider } else { FileConfigProvider::user() };

    match provider.load().await {
        Ok(config) => {
            if provider.exists() {
                logger.info(&format!(
                    "[Demo] Loaded {} config from {}",
                    provider.level().as_str(),
                    provider.path().display()
                ));
            }
            config
        }
        Err(e) => {
            logger.warn(&format!(
                "[Demo] Ignoring config at {}: {}",
                provider.path().display(),
                e
            ));
            ClientConfig::default()
        }
    }
}

async fn run(logger: Arc<dyn Logger>) -> ToolResult<()> {
    let delay = env::var("OPENTOOL_DEMO_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_DELAY_MS);

    // Server side
    let registry = Arc::new(ToolRegistry::new(logger.clone()));
    fruit::register_demo_tools(&registry, Duration::from_millis(delay))?;
    let engine = Arc::new(
        InvocationEngine::builder(registry)
            .with_logger(logger.clone())
            .with_middleware(Arc::new(LoggingMiddleware::new(logger.clone())))
            .build(),
    );

    // Client side
    println!("[Setup] Initializing transport and client...");
    let config = load_config(&logger)
        .await
        .with_header("Authorization", "Bearer your-token-here")
        .with_header("X-Custom-Header", "value");

    let cache = Arc::new(ToolCache::new());
    let client = Client::new(Arc::new(LocalTransport::new(engine)), config.clone())
        .with_logger(logger.clone())
        .with_log_handler(Arc::new(LoggerLogHandler::from_config(logger.clone(), &config)))
        .with_message_handler(cache.clone());

    client.connect().await?;
    println!("[Client] Connected successfully.");

    let tools = client.list_tools().await?;
    cache.store(tools.clone());

    println!("----- Available Tools -------");
    for tool in &tools {
        print_tool(tool);
    }

    let available = |name: &str| tools.iter().any(|t| t.name == name);

    if available("hello") {
        println!("[Tool Call] Invoking 'hello' tool with name='Alice'...");
        match client
            .call_tool("hello", json!({ "name": "Alice" }), CallOptions::new())
            .await
        {
            Ok(result) => println!("[Result] Hello Tool Response: {}", result),
            Err(e) => println!("[Error] Failed to call 'hello' tool: {}", e),
        }
    } else {
        println!("[Info] 'hello' tool not available");
    }

    if available("fruit_processor") {
        let fruits = ["apple", "banana", "cherry"];
        println!(
            "[Tool Call] Invoking 'fruit_processor' tool with fruits={:?}...",
            fruits
        );
        let options = CallOptions::new().with_progress_handler(Arc::new(print_progress));
        match client
            .call_tool("fruit_processor", json!({ "fruits": fruits }), options)
            .await
        {
            Ok(result) => println!("[Result] fruit_processor Response: {}", result),
            Err(e) => println!("[Error] Failed to call 'fruit_processor' tool: {}", e),
        }
    } else {
        println!("[Info] 'fruit_processor' tool not available");
    }

    client.disconnect();
    Ok(())
}

#[tokio::main]
async fn main() {
    println!("[Main] Starting async client...");
    let logger: Arc<dyn Logger> = Arc::new(
        ConsoleLogger::with_prefix("[opentool-demo]").with_min_level(LogLevel::Info),
    );

    if let Err(e) = run(logger).await {
        println!("[Error] Client operation failed: {}", e);
        std::process::exit(1);
    }
}
