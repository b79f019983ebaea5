//! Engine: the pipeline bound to the dispatch adapter
//!
//! One entry point per method family. Every entry point builds an
//! [`McpRequest`] and runs it through the frozen middleware pipeline with the
//! dispatcher as terminal stage.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::capabilities::ServerCapabilities;
use crate::capability::CapabilityRegistry;
use crate::dispatch::Dispatcher;
use crate::error::ProtocolError;
use crate::logger::McpLogger;
use crate::message::{methods, McpRequest, McpResponse};
use crate::pipeline::Pipeline;
use crate::schema::SchemaValidator;

pub type Headers = Option<HashMap<String, String>>;

/// Immutable request processor shared by every transport task
pub struct Engine {
    pipeline: Pipeline,
    dispatcher: Arc<Dispatcher>,
    capabilities: ServerCapabilities,
    logger: McpLogger,
}

impl Engine {
    pub fn new(
        registry: CapabilityRegistry,
        pipeline: Pipeline,
        validator: Arc<dyn SchemaValidator>,
        logger: McpLogger,
    ) -> Self {
        let capabilities = ServerCapabilities::from_registry(&registry);
        let dispatcher = Dispatcher::new(Arc::new(registry), validator, logger.clone());
        Self {
            pipeline,
            dispatcher: Arc::new(dispatcher),
            capabilities,
            logger,
        }
    }

    /// Capability advertisement, computed once at construction
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.dispatcher.registry()
    }

    pub fn logger(&self) -> &McpLogger {
        &self.logger
    }

    /// Whether `method` is served through the pipeline
    pub fn handles(method: &str) -> bool {
        methods::ALL.contains(&method)
    }

    /// Run a request through the pipeline
    pub async fn handle(&self, request: McpRequest) -> Result<McpResponse, ProtocolError> {
        if !Self::handles(&request.method) {
            return Err(ProtocolError::MethodNotFound(format!(
                "Method not found: {}",
                request.method
            )));
        }
        self.pipeline.execute(request, self.dispatcher.clone()).await
    }

    pub async fn list_tools(&self, headers: Headers) -> Result<McpResponse, ProtocolError> {
        self.handle(request(methods::TOOLS_LIST, Map::new(), headers)).await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        headers: Headers,
    ) -> Result<McpResponse, ProtocolError> {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        if let Some(arguments) = arguments {
            params.insert("arguments".to_string(), arguments);
        }
        self.handle(request(methods::TOOLS_CALL, params, headers)).await
    }

    pub async fn list_resources(&self, headers: Headers) -> Result<McpResponse, ProtocolError> {
        self.handle(request(methods::RESOURCES_LIST, Map::new(), headers))
            .await
    }

    pub async fn read_resource(&self, uri: &str, headers: Headers) -> Result<McpResponse, ProtocolError> {
        let mut params = Map::new();
        params.insert("uri".to_string(), Value::String(uri.to_string()));
        self.handle(request(methods::RESOURCES_READ, params, headers)).await
    }

    pub async fn list_prompts(&self, headers: Headers) -> Result<McpResponse, ProtocolError> {
        self.handle(request(methods::PROMPTS_LIST, Map::new(), headers))
            .await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
        headers: Headers,
    ) -> Result<McpResponse, ProtocolError> {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        if let Some(arguments) = arguments {
            params.insert("arguments".to_string(), arguments);
        }
        self.handle(request(methods::PROMPTS_GET, params, headers)).await
    }
}

fn request(method: &str, params: Map<String, Value>, headers: Headers) -> McpRequest {
    McpRequest {
        headers,
        params,
        method: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthGate;
    use crate::capability::{Prompt, PromptArgument, Resource, Tool};
    use crate::pipeline::{from_fn, MiddlewareStack, Next};
    use crate::protocol::ResourceBody;
    use crate::schema::JsonSchemaValidator;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry
            .add_tool(
                Tool::new("greet", |args| async move {
                    Ok(json!(format!("Hello {}!", args["name"].as_str().unwrap_or_default())))
                })
                .with_parameters(json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                })),
            )
            .unwrap();
        registry
            .add_resource(
                Resource::new("memo://note", "Note", || async { Ok(ResourceBody::text("remember")) })
                    .with_mime_type("text/plain"),
            )
            .unwrap();
        registry
            .add_prompt(
                Prompt::new("summarize", |args| async move { Ok(format!("Summarize: {}", args["text"])) })
                    .with_argument(PromptArgument::required("text")),
            )
            .unwrap();
        registry
    }

    fn engine(stack: &MiddlewareStack) -> Engine {
        Engine::new(
            registry(),
            stack.freeze(),
            Arc::new(JsonSchemaValidator),
            McpLogger::new("test"),
        )
    }

    #[tokio::test]
    async fn test_entry_points_reach_dispatcher() {
        let engine = engine(&MiddlewareStack::new());

        let tools = engine.list_tools(None).await.unwrap();
        assert_eq!(tools.content.unwrap()["tools"][0]["name"], json!("greet"));

        let call = engine
            .call_tool("greet", Some(json!({"name": "Ada"})), None)
            .await
            .unwrap();
        assert_eq!(call.content.unwrap()["content"][0]["text"], json!("Hello Ada!"));

        let read = engine.read_resource("memo://note", None).await.unwrap();
        assert_eq!(read.content.unwrap()["contents"][0]["text"], json!("remember"));

        let prompt = engine
            .get_prompt("summarize", Some(json!({"text": "long story"})), None)
            .await
            .unwrap();
        assert_eq!(
            prompt.content.unwrap()["messages"][0]["content"]["text"],
            json!("Summarize: long story")
        );
    }

    #[tokio::test]
    async fn test_unknown_method_rejected_before_pipeline() {
        let entered = Arc::new(AtomicBool::new(false));
        let mut stack = MiddlewareStack::new();
        let flag = entered.clone();
        stack.push(Arc::new(from_fn(move |request, next: Next| {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok(next.run(request).await?)
            }
        })));

        let err = engine(&stack)
            .handle(McpRequest::new("sampling/createMessage"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProtocolError::MethodNotFound(_)));
        assert!(!entered.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_gate_applies_to_every_family() {
        let mut stack = MiddlewareStack::new();
        stack.set_gate(Arc::new(AuthGate::from_fn(|_request| async { Ok(false) })));
        let engine = engine(&stack);

        for result in [
            engine.list_tools(None).await,
            engine.call_tool("greet", None, None).await,
            engine.list_resources(None).await,
            engine.read_resource("memo://note", None).await,
            engine.list_prompts(None).await,
            engine.get_prompt("summarize", None, None).await,
        ] {
            assert!(matches!(result, Err(ProtocolError::Unauthorized(_))));
        }
    }

    #[tokio::test]
    async fn test_middleware_can_rewrite_tool_arguments() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(from_fn(|mut request: McpRequest, next: Next| async move {
            if let Some(Value::Object(args)) = request.params.get_mut("arguments") {
                args.insert("name".to_string(), json!("middleware"));
            }
            Ok(next.run(request).await?)
        })));

        let response = engine(&stack)
            .call_tool("greet", Some(json!({"name": "client"})), None)
            .await
            .unwrap();

        assert_eq!(response.content.unwrap()["content"][0]["text"], json!("Hello middleware!"));
    }

    #[test]
    fn test_capabilities_follow_registry() {
        let engine = engine(&MiddlewareStack::new());
        let caps = engine.capabilities();

        assert!(caps.tools.is_some());
        assert!(caps.resources.is_some());
        assert!(caps.prompts.is_some());
        assert!(caps.logging.is_some());
    }
}
