//! MCP request handler

use emcp_core::{Engine, Headers, McpRequest, ProtocolError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::*;

/// Routes JSON-RPC messages to the engine
pub struct RequestHandler {
    engine: Arc<Engine>,
    server_info: ServerInfo,
    /// Whether a client completed `initialize`
    initialized: AtomicBool,
}

impl RequestHandler {
    /// Create a new request handler
    pub fn new(engine: Arc<Engine>, server_info: ServerInfo) -> Self {
        Self {
            engine,
            server_info,
            initialized: false.into(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Handle an incoming message.
    ///
    /// `headers` carries transport metadata (HTTP headers) for the pipeline;
    /// stdio passes `None`.
    pub async fn handle(&self, message: McpMessage, headers: Headers) -> Option<McpMessage> {
        if message.is_response() {
            // Response - we don't expect these in server mode
            debug!("Received unexpected response");
            return None;
        }

        let McpMessage { id, method, params, .. } = message;
        let Some(method) = method else {
            return Some(McpMessage::error_response(
                id,
                ProtocolError::InvalidRequest("Missing method".to_string()).into(),
            ));
        };

        let Some(id) = id else {
            self.handle_notification(&method);
            return None;
        };

        debug!("Handling request: {}", method);
        if Engine::handles(&method) && !self.is_initialized() {
            warn!("Received {} before initialize", method);
        }

        let result = match method.as_str() {
            "initialize" => self.handle_initialize(params),
            "ping" => Ok(serde_json::json!({})),
            "logging/setLevel" => self.handle_set_level(params),
            m if Engine::handles(m) => self.handle_capability(m, params, headers).await,
            _ => Err(ProtocolError::MethodNotFound(format!("Method not found: {method}"))),
        };

        Some(match result {
            Ok(result) => McpMessage::response(id, result),
            Err(error) => McpMessage::error_response(Some(id), error.into()),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                debug!("Request cancelled");
            }
            _ => {
                debug!("Unknown notification: {}", method);
            }
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".to_string()))?;

        info!(
            "Initializing session with client: {} v{}",
            params.client_info.name, params.client_info.version
        );

        self.initialized.store(true, Ordering::Relaxed);

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: self.engine.capabilities().clone(),
            server_info: self.server_info.clone(),
        };

        serde_json::to_value(result).map_err(|e| ProtocolError::internal(e.to_string()))
    }

    /// Handle logging/setLevel request
    fn handle_set_level(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: SetLevelParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".to_string()))?;

        debug!("Setting log level: {:?}", params.level);
        self.engine.logger().set_level(params.level);
        Ok(serde_json::json!({}))
    }

    /// Run one of the capability families through the pipeline
    async fn handle_capability(
        &self,
        method: &str,
        params: Option<Value>,
        headers: Headers,
    ) -> Result<Value, ProtocolError> {
        let request = McpRequest::from_value(method, params, headers)?;
        let response = self.engine.handle(request).await?;

        // Middleware may also answer with an error object instead of failing.
        if let Some(error) = response.error {
            return Err(match error.code {
                emcp_core::error::codes::UNAUTHORIZED => ProtocolError::Unauthorized(error.message),
                emcp_core::error::codes::METHOD_NOT_FOUND => ProtocolError::MethodNotFound(error.message),
                emcp_core::error::codes::INVALID_REQUEST => ProtocolError::InvalidRequest(error.message),
                emcp_core::error::codes::INVALID_PARAMS => ProtocolError::InvalidParams(error.message),
                _ => ProtocolError::InternalError {
                    message: error.message,
                    data: error.data,
                },
            });
        }

        Ok(response.content.unwrap_or_else(|| serde_json::json!({})))
    }
}
