//! Custom middleware on top of the built-in authentication gate.
//!
//! Middleware runs like an onion. For the three layers below a request flows:
//!
//! ```text
//! auth gate -> timer -> logger -> lifecycle check -> tool
//! auth gate <- timer <- logger <- lifecycle check <- tool
//! ```
//!
//! Run with `cargo run --example custom_middleware` and talk to it over stdio.
//! Set `RUST_LOG=debug` to see the layers fire.

use emcp_core::{Next, Tool};
use emcp_server::{McpServer, TransportMode};
use serde_json::json;
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut server = McpServer::new("mcp-server-with-middleware", "1.0.0");
    let logger = server.logger();
    tracing::info!("Initializing mcp-server-with-middleware...");

    // Put real credential checks here
    server.with_authentication_fn(|_request| async { Ok(true) });

    // Timer: covers every inner layer and the handler
    let timer = logger.clone();
    server.use_fn(move |request, next: Next| {
        let logger = timer.clone();
        async move {
            let method = request.method.clone();
            let started = Instant::now();
            logger.debug("Request started", json!({ "method": method }));

            let response = next.run(request).await?;

            logger.debug(
                "Request completed",
                json!({ "method": method, "duration": format!("{}ms", started.elapsed().as_millis()) }),
            );
            Ok(response)
        }
    });
    tracing::info!("Registered 'Timer' middleware");

    // Logger: request in, response out
    let log = logger.clone();
    server.use_fn(move |request, next: Next| {
        let logger = log.clone();
        async move {
            logger.debug(
                "Request received",
                json!({ "method": request.method, "params": request.params }),
            );
            let response = next.run(request).await?;
            logger.debug("Response sent", json!({ "content": response.content }));
            Ok(response)
        }
    });
    tracing::info!("Registered 'Logger' middleware");

    // Lifecycle check: inspects params before the handler runs
    let check = logger.clone();
    server.use_fn(move |request, next: Next| {
        let logger = check.clone();
        async move {
            match request.params.get("lifecycle") {
                Some(lifecycle) => logger.debug("Lifecycle found", lifecycle.clone()),
                None => logger.debug("There's no lifecycle", serde_json::Value::Null),
            }
            let response = next.run(request).await?;
            logger.debug("We're about to send a response!", serde_json::Value::Null);
            Ok(response)
        }
    });
    tracing::info!("Registered 'Lifecycle check' middleware");

    let tool_logger = logger.clone();
    server.add_tool(
        Tool::new("add", move |args| {
            let logger = tool_logger.clone();
            async move {
                logger.debug("Adding two numbers", args.clone());
                let a = args["a"].as_f64().unwrap_or_default();
                let b = args["b"].as_f64().unwrap_or_default();
                Ok(json!(a + b))
            }
        })
        .with_description("Add two numbers")
        .with_parameters(json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        })),
    )?;
    tracing::info!("Added 'add' tool");

    server.start(TransportMode::Stdio).await
}
