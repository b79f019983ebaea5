//! Dispatch adapter: the terminal stage that turns a request into capability
//! behavior and shapes the result envelope.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capability::{CapabilityRegistry, PromptArguments};
use crate::error::ProtocolError;
use crate::logger::McpLogger;
use crate::message::{methods, McpRequest, McpResponse};
use crate::pipeline::TerminalHandler;
use crate::protocol::*;
use crate::schema::SchemaValidator;

/// Terminal handler over a read-only registry
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    validator: Arc<dyn SchemaValidator>,
    logger: McpLogger,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        validator: Arc<dyn SchemaValidator>,
        logger: McpLogger,
    ) -> Self {
        Self {
            registry,
            validator,
            logger,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn list_tools(&self) -> ToolsListResult {
        ToolsListResult {
            tools: self.registry.tools().values().map(|t| t.descriptor()).collect(),
        }
    }

    /// Invoke a tool.
    ///
    /// A failing tool body is reported inside the result with `isError` set,
    /// never as a protocol error.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolCallResult, ProtocolError> {
        let tool = self
            .registry
            .tool(name)
            .ok_or_else(|| ProtocolError::MethodNotFound(format!("Unknown tool: {name}")))?;

        let args = arguments.unwrap_or_else(|| Value::Object(Map::new()));
        let args = match &tool.parameters {
            Some(schema) => self.validator.validate(schema, args).map_err(|e| {
                debug!("Rejected {} arguments: {}", name, e);
                ProtocolError::InvalidRequest(format!("Invalid {name} arguments"))
            })?,
            None => args,
        };

        debug!("Calling tool: {}", name);
        match tool.execute(args).await {
            Ok(Value::String(text)) => Ok(ToolCallResult::text(text)),
            Ok(value) => {
                let text = serde_json::to_string_pretty(&value)
                    .map_err(|e| ProtocolError::internal(e.to_string()))?;
                Ok(ToolCallResult::text(text))
            }
            Err(e) => {
                warn!("Tool {} failed: {:#}", name, e);
                self.logger.error(
                    "Tool execution failed",
                    serde_json::json!({ "tool": name, "error": format!("{e:#}") }),
                );
                Ok(ToolCallResult::error(format!("Error: {e:#}")))
            }
        }
    }

    pub fn list_resources(&self) -> ResourcesListResult {
        ResourcesListResult {
            resources: self
                .registry
                .resources()
                .values()
                .map(|r| r.descriptor())
                .collect(),
        }
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, ProtocolError> {
        let resource = self
            .registry
            .resource(uri)
            .ok_or_else(|| ProtocolError::MethodNotFound(format!("Unknown resource: {uri}")))?;

        let body = resource.load().await.map_err(|e| {
            ProtocolError::internal_with_data(
                format!("Error reading resource: {e:#}"),
                serde_json::json!({ "uri": resource.uri }),
            )
        })?;

        Ok(ReadResourceResult {
            contents: vec![resource.contents(body)],
        })
    }

    pub fn list_prompts(&self) -> PromptsListResult {
        PromptsListResult {
            prompts: self.registry.prompts().values().map(|p| p.descriptor()).collect(),
        }
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        args: PromptArguments,
    ) -> Result<GetPromptResult, ProtocolError> {
        let prompt = self
            .registry
            .prompt(name)
            .ok_or_else(|| unknown_prompt(name))?;

        if let Some(missing) = prompt.missing_required(&args) {
            return Err(ProtocolError::InvalidRequest(format!(
                "Missing required argument: {missing}"
            )));
        }

        let text = prompt
            .load(args)
            .await
            .map_err(|e| ProtocolError::internal(format!("Error loading prompt: {e:#}")))?;

        Ok(GetPromptResult {
            description: prompt.description.clone(),
            messages: vec![PromptMessage {
                role: Role::User,
                content: ToolContent::Text { text },
            }],
        })
    }

    async fn route(&self, request: &McpRequest) -> Result<Value, ProtocolError> {
        match request.method.as_str() {
            methods::TOOLS_LIST => to_value(self.list_tools()),
            methods::TOOLS_CALL => {
                let name = required_str(request, "name")?;
                let arguments = request.params.get("arguments").cloned().filter(|v| !v.is_null());
                to_value(self.call_tool(name, arguments).await?)
            }
            methods::RESOURCES_LIST => to_value(self.list_resources()),
            methods::RESOURCES_READ => {
                let uri = required_str(request, "uri")?;
                to_value(self.read_resource(uri).await?)
            }
            methods::PROMPTS_LIST => to_value(self.list_prompts()),
            methods::PROMPTS_GET => {
                let name = required_str(request, "name")?;
                if self.registry.prompt(name).is_none() {
                    return Err(unknown_prompt(name));
                }
                let args = prompt_arguments(request)?;
                to_value(self.get_prompt(name, args).await?)
            }
            other => Err(ProtocolError::MethodNotFound(format!(
                "Method not found: {other}"
            ))),
        }
    }
}

#[async_trait]
impl TerminalHandler for Dispatcher {
    async fn call(&self, request: McpRequest) -> Result<McpResponse, ProtocolError> {
        self.route(&request).await.map(McpResponse::content)
    }
}

fn to_value<T: Serialize>(result: T) -> Result<Value, ProtocolError> {
    serde_json::to_value(result).map_err(|e| ProtocolError::internal(e.to_string()))
}

fn unknown_prompt(name: &str) -> ProtocolError {
    ProtocolError::MethodNotFound(format!("Unknown prompt: {name}"))
}

fn required_str<'a>(request: &'a McpRequest, key: &str) -> Result<&'a str, ProtocolError> {
    request
        .param_str(key)
        .ok_or_else(|| ProtocolError::InvalidParams(format!("Missing required parameter: {key}")))
}

fn prompt_arguments(request: &McpRequest) -> Result<PromptArguments, ProtocolError> {
    match request.params.get("arguments") {
        None | Some(Value::Null) => Ok(PromptArguments::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| ProtocolError::InvalidParams(format!("Invalid prompt arguments: {e}"))),
    }
}
