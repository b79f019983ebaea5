//! # emcp-core
//!
//! Request-processing engine for eMCP servers:
//! - Ordered registry of tools, resources and prompts
//! - Onion-style async middleware pipeline with short-circuiting
//! - Optional authentication gate as the outermost middleware
//! - Dispatch adapter shaping MCP result envelopes
//! - Structured protocol error taxonomy

pub mod auth;
pub mod capabilities;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod logger;
pub mod message;
pub mod pipeline;
pub mod protocol;
pub mod schema;
mod engine;

pub use auth::{ApiKeyAuth, AuthGate, AuthRequest, AuthenticationHandler};
pub use capabilities::ServerCapabilities;
pub use capability::{CapabilityRegistry, Prompt, PromptArgument, PromptArguments, Resource, Tool};
pub use engine::{Engine, Headers};
pub use error::{ErrorObject, MiddlewareError, ProtocolError, RegistryError, Result};
pub use logger::{LogLevel, LogMessage, McpLogger};
pub use message::{methods, McpRequest, McpResponse};
pub use pipeline::{from_fn, Middleware, MiddlewareStack, Next, Pipeline};
pub use protocol::ResourceBody;
pub use schema::{JsonSchemaValidator, SchemaError, SchemaValidator};
