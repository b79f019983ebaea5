//! # emcp-server
//!
//! MCP server surface for the eMCP engine.
//! Supports both stdio and streamable HTTP (with SSE log notifications) transports.

pub mod config;
pub mod protocol;
mod server;
pub mod transport;

pub use config::{ConfigError, ServerConfig, TransportMode};
pub use protocol::{McpMessage, RequestHandler, ServerInfo};
pub use server::{McpServer, ServerHandle};
pub use transport::{HttpTransport, StdioTransport};
