//! eMCP server CLI - runs a demo MCP server on stdio or streamable HTTP
//!
//! Registers an `add` tool, an application log resource and a `git-commit`
//! prompt behind a request timing middleware. In HTTP mode, `--api-key` (or
//! `EMCP_API_KEY`) requires a matching `x-api-key` header on every request.

use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

use emcp_core::{ApiKeyAuth, Next, Prompt, PromptArgument, Resource, ResourceBody, Tool};
use emcp_server::config::{DEFAULT_ENDPOINT, DEFAULT_HOST, DEFAULT_PORT};
use emcp_server::{McpServer, ServerConfig, TransportMode};

/// eMCP - MCP server with an onion-style middleware pipeline
#[derive(Parser, Debug)]
#[command(name = "emcp-server")]
#[command(version)]
#[command(about = "eMCP - MCP server with composable middleware and authentication")]
struct Args {
    /// YAML or JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run in stdio mode (for MCP clients like Claude Desktop)
    #[arg(long, conflicts_with = "http")]
    stdio: bool,

    /// Run in streamable HTTP mode
    #[arg(long)]
    http: bool,

    /// Port for HTTP server (default: 3000)
    #[arg(long)]
    port: Option<u16>,

    /// Host to bind the HTTP server to (default: 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// URL path of the MCP endpoint (default: /mcp)
    #[arg(long)]
    endpoint: Option<String>,

    /// Require this key in the `x-api-key` header
    #[arg(long, env = "EMCP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// tracing filter directive, e.g. `debug` or `emcp_core=trace`
    #[arg(long)]
    log_level: Option<String>,
}

/// Merge CLI flags over the file configuration
fn resolve_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    let wants_http = args.http || args.port.is_some() || args.endpoint.is_some() || args.host.is_some();
    if args.stdio {
        config.transport = TransportMode::Stdio;
    } else if wants_http {
        let (mut host, mut port, mut endpoint) = match config.transport {
            TransportMode::Http { host, port, endpoint } => (host, port, endpoint),
            TransportMode::Stdio => (
                DEFAULT_HOST.to_string(),
                DEFAULT_PORT,
                DEFAULT_ENDPOINT.to_string(),
            ),
        };
        if let Some(h) = &args.host {
            host = h.clone();
        }
        if let Some(p) = args.port {
            port = p;
        }
        if let Some(e) = &args.endpoint {
            endpoint = e.clone();
        }
        config.transport = TransportMode::Http { host, port, endpoint };
    }

    config.validate()?;
    Ok(config)
}

fn number_arg(args: &Value, key: &str) -> anyhow::Result<f64> {
    args.get(key)
        .and_then(Value::as_f64)
        .with_context(|| format!("argument '{key}' must be a number"))
}

fn build_server(config: &ServerConfig, api_key: Option<String>) -> anyhow::Result<McpServer> {
    let mut server = McpServer::from_config(config);
    let logger = server.logger();

    match (api_key, &config.transport) {
        (Some(_), TransportMode::Stdio) => {
            warn!("Ignoring API key: stdio requests carry no headers");
        }
        (Some(key), TransportMode::Http { .. }) => {
            server.with_authentication(ApiKeyAuth::new("x-api-key", key));
        }
        (None, _) => {}
    }

    // Times the whole request, including inner middleware and the handler
    let timer_logger = logger.clone();
    server.use_fn(move |request, next: Next| {
        let logger = timer_logger.clone();
        async move {
            let method = request.method.clone();
            let started = std::time::Instant::now();
            logger.debug("Request started", json!({ "method": method }));

            let response = next.run(request).await?;

            logger.debug(
                "Request completed",
                json!({ "method": method, "duration": format!("{}ms", started.elapsed().as_millis()) }),
            );
            Ok(response)
        }
    });

    let tool_logger = logger.clone();
    server.add_tool(
        Tool::new("add", move |args| {
            let logger = tool_logger.clone();
            async move {
                logger.debug("Adding two numbers", args.clone());
                let sum = number_arg(&args, "a")? + number_arg(&args, "b")?;
                Ok(json!(sum))
            }
        })
        .with_description("Add two numbers")
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["a", "b"]
        })),
    )?;

    server.add_resource(
        Resource::new("file:///logs/app.log", "Application Logs", || async {
            Ok(ResourceBody::text("Example log content"))
        })
        .with_mime_type("text/plain"),
    )?;

    server.add_prompt(
        Prompt::new("git-commit", |args| async move {
            let changes = args.get("changes").cloned().unwrap_or_default();
            Ok(format!(
                "Generate a concise but descriptive commit message for these changes:\n\n{changes}"
            ))
        })
        .with_description("Generate a Git commit message")
        .with_argument(
            PromptArgument::required("changes").with_description("Git diff or description of changes"),
        ),
    )?;

    Ok(server)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    // Diagnostics go to stderr so stdout stays protocol-clean in stdio mode
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let server = build_server(&config, args.api_key.clone())?;

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            handle.close();
        }
    });

    match &config.transport {
        TransportMode::Stdio => info!("Starting MCP server in stdio mode"),
        TransportMode::Http { host, port, endpoint } => {
            info!("Starting MCP server on http://{}:{}{}", host, port, endpoint)
        }
    }

    server.start(config.transport.clone()).await
}
