//! HTTP router tests driven through `tower::ServiceExt::oneshot`

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use emcp_core::{ApiKeyAuth, Tool};
use emcp_server::{HttpTransport, McpServer, RequestHandler};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

fn router(api_key: Option<&str>) -> (Router, watch::Sender<bool>) {
    let mut server = McpServer::new("http-test", "0.1.0");
    server
        .add_tool(
            Tool::new("greet", |args| async move {
                Ok(json!(format!("Hello {}!", args["name"].as_str().unwrap_or("stranger"))))
            })
            .with_description("Greets a person"),
        )
        .unwrap();
    if let Some(key) = api_key {
        server.with_authentication(ApiKeyAuth::new("x-api-key", key));
    }

    let info = server.info().clone();
    let logger = server.logger();
    let handler = Arc::new(RequestHandler::new(Arc::new(server.into_engine()), info));
    let transport = HttpTransport::new(handler, logger, "127.0.0.1", 0, "/mcp");

    let (shutdown, rx) = watch::channel(false);
    (transport.router(rx), shutdown)
}

fn post(body: Value) -> Request<Body> {
    Request::post("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _shutdown) = router(None);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_tools_list_and_call() {
    let (app, _shutdown) = router(None);

    let listed = app
        .clone()
        .oneshot(post(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let listed = json_body(listed).await;
    assert_eq!(listed["result"]["tools"][0]["name"], json!("greet"));
    assert_eq!(listed["result"]["tools"][0]["inputSchema"], json!({"type": "object"}));

    let called = app
        .oneshot(post(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "greet", "arguments": {"name": "Ada"}}
        })))
        .await
        .unwrap();
    let called = json_body(called).await;
    assert_eq!(called["id"], json!(2));
    assert_eq!(called["result"]["content"][0]["text"], json!("Hello Ada!"));
}

#[tokio::test]
async fn test_initialize_over_http() {
    let (app, _shutdown) = router(None);

    let response = app
        .oneshot(post(json!({
            "jsonrpc": "2.0",
            "id": "init",
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test", "version": "1"}
            }
        })))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["result"]["protocolVersion"], json!("2024-11-05"));
    assert_eq!(body["result"]["capabilities"], json!({"tools": {}, "logging": {}}));
}

#[tokio::test]
async fn test_api_key_header_is_checked() {
    let (app, _shutdown) = router(Some("s3cret"));

    let denied = app
        .clone()
        .oneshot(post(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})))
        .await
        .unwrap();
    let denied = json_body(denied).await;
    assert_eq!(denied["error"]["code"], json!(401));
    assert_eq!(denied["error"]["message"], json!("Request authentication failed"));

    let mut request = post(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}));
    request
        .headers_mut()
        .insert("X-API-Key", "s3cret".parse().unwrap());
    let allowed = json_body(app.oneshot(request).await.unwrap()).await;
    assert!(allowed.get("error").is_none());
    assert_eq!(allowed["result"]["tools"][0]["name"], json!("greet"));
}

#[tokio::test]
async fn test_ping_bypasses_authentication() {
    let (app, _shutdown) = router(Some("s3cret"));

    let response = app
        .oneshot(post(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})))
        .await
        .unwrap();

    assert_eq!(json_body(response).await["result"], json!({}));
}

#[tokio::test]
async fn test_notification_is_accepted() {
    let (app, _shutdown) = router(None);

    let response = app
        .oneshot(post(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let (app, _shutdown) = router(None);

    let response = app
        .oneshot(
            Request::post("/mcp")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], json!(-32700));
}

#[tokio::test]
async fn test_sse_stream_opens() {
    let (app, shutdown) = router(None);

    let response = app
        .oneshot(Request::get("/mcp").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    // The stream ends once the server shuts down.
    shutdown.send_replace(true);
    let body = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("SSE stream did not close");
    assert!(body.is_ok());
}
