//! Authentication gate on the streamable HTTP transport.
//!
//! Every tool, resource and prompt request must carry
//! `Authorization: Bearer <token>`; the token defaults to `demo-token` and can
//! be changed with `DEMO_TOKEN`. Rejected requests get a 401 JSON-RPC error.
//!
//! ```text
//! curl -s localhost:3000/mcp -H 'authorization: Bearer demo-token' \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"tools/list"}'
//! ```

use emcp_core::Tool;
use emcp_server::{McpServer, TransportMode};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let token = std::env::var("DEMO_TOKEN").unwrap_or_else(|_| "demo-token".to_string());
    let expected = format!("Bearer {token}");

    let mut server = McpServer::new("mcp-server-with-auth", "1.0.0");
    server.with_authentication_fn(move |request| {
        let authorized = request.header("authorization") == Some(expected.as_str());
        async move { Ok(authorized) }
    });

    // Requests to this tool, or any other resource or prompt, go through the gate
    let logger = server.logger();
    server.add_tool(
        Tool::new("add", move |args| {
            let logger = logger.clone();
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

    let handle = server.handle();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        handle.close();
    });

    server.start(TransportMode::http(3000)).await
}
