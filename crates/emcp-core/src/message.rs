//! Request and response values that flow through the pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{ErrorObject, ProtocolError};

/// Method names of the capability families served by the engine
pub mod methods {
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";

    /// All methods routed through the middleware pipeline
    pub const ALL: [&str; 6] = [
        TOOLS_LIST,
        TOOLS_CALL,
        RESOURCES_LIST,
        RESOURCES_READ,
        PROMPTS_LIST,
        PROMPTS_GET,
    ];
}

/// Inbound request as seen by middleware.
///
/// Middleware owns the request while it runs and may change `params` before
/// handing it to the next stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub method: String,
}

impl McpRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            headers: None,
            params: Map::new(),
            method: method.into(),
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Build a request from raw JSON-RPC params. Non-object params are rejected.
    pub fn from_value(
        method: impl Into<String>,
        params: Option<Value>,
        headers: Option<HashMap<String, String>>,
    ) -> Result<Self, ProtocolError> {
        let params = match params {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ProtocolError::InvalidParams(
                    "params must be an object".to_string(),
                ))
            }
        };
        Ok(Self {
            headers,
            params,
            method: method.into(),
        })
    }

    /// Header lookup by lowercase name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// String parameter lookup
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Outbound response.
///
/// Post-processing middleware may replace or wrap `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl McpResponse {
    pub fn content(content: Value) -> Self {
        Self {
            content: Some(content),
            error: None,
        }
    }

    pub fn error(error: impl Into<ErrorObject>) -> Self {
        Self {
            content: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_non_object_params() {
        let err = McpRequest::from_value("tools/call", Some(json!([1, 2])), None).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams(_)));
    }

    #[test]
    fn test_from_value_accepts_missing_params() {
        let request = McpRequest::from_value("tools/list", None, None).unwrap();
        assert!(request.params.is_empty());
        assert_eq!(request.method, "tools/list");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let request = McpRequest::new("tools/list").with_headers(headers);

        assert_eq!(request.header("X-Api-Key"), Some("secret"));
        assert_eq!(request.header("authorization"), None);
    }
}
