//! Request and response rewriting in middleware, served over HTTP.
//!
//! The inner middleware stamps every request with a `timestamp` param and
//! wraps every successful result as `{data, metadata: {processedAt}}`.

use chrono::Utc;
use emcp_core::{McpResponse, Next, Tool};
use emcp_server::{McpServer, TransportMode};
use serde_json::{json, Value};
use std::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut server = McpServer::new("advanced-example", "1.0.0");
    let logger = server.logger();

    server.add_tool(
        Tool::new("greet", |args| async move {
            let name = args["name"].as_str().unwrap_or("stranger");
            Ok(json!(format!("Hello {name}!")))
        })
        .with_description("Greets a person")
        .with_parameters(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        })),
    )?;

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

    let stamp = logger.clone();
    server.use_fn(move |mut request, next: Next| {
        let logger = stamp.clone();
        async move {
            match request.params.get("lifecycle") {
                Some(lifecycle) => logger.debug("Lifecycle parameter found", lifecycle.clone()),
                None => logger.debug("No lifecycle parameter found", Value::Null),
            }

            request
                .params
                .insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));

            let response = next.run(request).await?;

            Ok(match response.content {
                Some(content) => McpResponse::content(json!({
                    "data": content,
                    "metadata": {"processedAt": Utc::now().to_rfc3339()}
                })),
                None => response,
            })
        }
    });

    let handle = server.handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        handle.close();
    });

    server
        .start(TransportMode::Http {
            host: "127.0.0.1".to_string(),
            port: 3000,
            endpoint: "/mcp".to_string(),
        })
        .await
}
