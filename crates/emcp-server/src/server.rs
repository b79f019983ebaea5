//! Main MCP server orchestration

use emcp_core::{
    from_fn, AuthGate, AuthRequest, AuthenticationHandler, CapabilityRegistry, Engine,
    JsonSchemaValidator, McpLogger, McpRequest, McpResponse, Middleware, MiddlewareError,
    MiddlewareStack, Next, Prompt, RegistryError, Resource, SchemaValidator, ServerCapabilities,
    Tool,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::config::{ServerConfig, TransportMode};
use crate::protocol::{RequestHandler, ServerInfo};
use crate::transport::{HttpTransport, StdioTransport};

/// MCP server builder.
///
/// Collects capabilities and middleware, then freezes them into an
/// [`Engine`] when started. Registrations made after `start` are impossible
/// since `start` consumes the builder.
pub struct McpServer {
    info: ServerInfo,
    registry: CapabilityRegistry,
    stack: MiddlewareStack,
    validator: Arc<dyn SchemaValidator>,
    logger: McpLogger,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Stops a running server from another task
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl ServerHandle {
    /// Signal shutdown; a server not yet started exits as soon as it starts
    pub fn close(&self) {
        info!("Closing MCP server");
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let (shutdown, _) = watch::channel(false);
        Self {
            logger: McpLogger::new(name.clone()),
            info: ServerInfo {
                name,
                version: version.into(),
            },
            registry: CapabilityRegistry::new(),
            stack: MiddlewareStack::new(),
            validator: Arc::new(JsonSchemaValidator),
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.name.clone(), config.version.clone())
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Require every capability request to pass `handler` first
    pub fn with_authentication(&mut self, handler: impl AuthenticationHandler + 'static) -> &mut Self {
        self.stack.set_gate(Arc::new(AuthGate::new(Arc::new(handler))));
        self
    }

    /// [`with_authentication`](Self::with_authentication) for an async closure
    pub fn with_authentication_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(AuthRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        self.stack.set_gate(Arc::new(AuthGate::from_fn(f)));
        self
    }

    /// Replace the JSON Schema validator used for tool arguments
    pub fn with_validator(&mut self, validator: impl SchemaValidator + 'static) -> &mut Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Append middleware; the first registered runs outermost
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.stack.push(Arc::new(middleware));
        self
    }

    /// [`use_middleware`](Self::use_middleware) for an async closure
    pub fn use_fn<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(McpRequest, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<McpResponse, MiddlewareError>> + Send + 'static,
    {
        self.use_middleware(from_fn(f))
    }

    pub fn add_tool(&mut self, tool: Tool) -> Result<&mut Self, RegistryError> {
        self.registry.add_tool(tool)?;
        Ok(self)
    }

    pub fn add_resource(&mut self, resource: Resource) -> Result<&mut Self, RegistryError> {
        self.registry.add_resource(resource)?;
        Ok(self)
    }

    pub fn add_prompt(&mut self, prompt: Prompt) -> Result<&mut Self, RegistryError> {
        self.registry.add_prompt(prompt)?;
        Ok(self)
    }

    /// Protocol logger shared with tools and middleware
    pub fn logger(&self) -> McpLogger {
        self.logger.clone()
    }

    /// What `initialize` will advertise given the current registrations
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities::from_registry(&self.registry)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Freeze registrations and middleware into a request engine
    pub fn into_engine(self) -> Engine {
        Engine::new(self.registry, self.stack.freeze(), self.validator, self.logger)
    }

    /// Serve on `mode` until EOF (stdio) or [`ServerHandle::close`]
    pub async fn start(self, mode: TransportMode) -> anyhow::Result<()> {
        let shutdown = self.shutdown.clone();
        let logger = self.logger.clone();
        let info = self.info.clone();

        info!(
            "Starting {} v{} with {} tools, {} resources, {} prompts, {} middleware",
            info.name,
            info.version,
            self.registry.tools().len(),
            self.registry.resources().len(),
            self.registry.prompts().len(),
            self.stack.len()
        );

        let handler = Arc::new(RequestHandler::new(Arc::new(self.into_engine()), info));

        match mode {
            TransportMode::Stdio => {
                StdioTransport::new(handler, logger)
                    .run(shutdown.subscribe())
                    .await
            }
            TransportMode::Http { host, port, endpoint } => {
                HttpTransport::new(handler, logger, host, port, endpoint)
                    .run(shutdown.subscribe())
                    .await
            }
        }
    }
}
