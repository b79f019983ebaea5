//! Transport implementations for MCP server

mod http;
mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use emcp_core::LogMessage;

use crate::protocol::McpMessage;

/// Method name of the server-to-client log notification
pub const LOG_NOTIFICATION: &str = "notifications/message";

/// Wrap a logger message in a JSON-RPC notification
pub(crate) fn log_notification(message: &LogMessage) -> McpMessage {
    McpMessage::notification(LOG_NOTIFICATION, serde_json::to_value(message).ok())
}
