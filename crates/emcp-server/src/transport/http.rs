//! Streamable HTTP transport for MCP

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use emcp_core::{ErrorObject, McpLogger};
use futures::stream::Stream;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::log_notification;
use crate::protocol::{McpMessage, RequestHandler};

/// Shared state for HTTP handlers
struct AppState {
    handler: Arc<RequestHandler>,
    logger: McpLogger,
    shutdown: watch::Receiver<bool>,
}

/// HTTP transport for MCP protocol
pub struct HttpTransport {
    handler: Arc<RequestHandler>,
    logger: McpLogger,
    host: String,
    port: u16,
    endpoint: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(
        handler: Arc<RequestHandler>,
        logger: McpLogger,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            logger,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Build the router; SSE streams end once `shutdown` flips to true
    pub fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let state = Arc::new(AppState {
            handler: self.handler.clone(),
            logger: self.logger.clone(),
            shutdown,
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(health))
            .route(
                &self.endpoint,
                post(handle_mcp_request).get(handle_mcp_sse),
            )
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Run the HTTP server until `shutdown` flips to true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = self.router(shutdown.clone());

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Starting MCP HTTP server on http://{}{}", addr, self.endpoint);

        let mut signal = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = signal.wait_for(|stopped| *stopped).await;
                info!("HTTP server shutting down");
            })
            .await?;

        Ok(())
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// Header names arrive lowercased from `http`; values that aren't valid UTF-8 are skipped
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// Handle one JSON-RPC message via HTTP POST
async fn handle_mcp_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: McpMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to parse HTTP body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(McpMessage::error_response(None, ErrorObject::parse_error())),
            )
                .into_response();
        }
    };

    debug!("HTTP request: {:?}", message.method);

    match state.handler.handle(message, Some(header_map(&headers))).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Stream log notifications to the client as Server-Sent Events
async fn handle_mcp_sse(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE connection established");

    let mut logs = state.logger.subscribe();
    let mut shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            let received = tokio::select! {
                _ = shutdown.wait_for(|stopped| *stopped) => None,
                message = logs.recv() => Some(message),
            };

            match received {
                Some(Ok(message)) => {
                    match Event::default().event("message").json_data(log_notification(&message)) {
                        Ok(event) => yield Ok::<_, Infallible>(event),
                        Err(e) => warn!("Failed to encode SSE event: {}", e),
                    }
                }
                Some(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!("SSE client lagged, dropped {} log notifications", skipped);
                }
                Some(Err(broadcast::error::RecvError::Closed)) | None => break,
            }
        }
        debug!("SSE connection closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
