//! Error types for emcp-core

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Numeric error codes carried on the wire
pub mod codes {
    /// Authentication gate rejected the request
    pub const UNAUTHORIZED: i32 = 401;
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structured protocol error.
///
/// Anything that crosses the system boundary as a failure is one of these.
/// Tool execution failures are not: they are reported as response content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    MethodNotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("{message}")]
    InternalError {
        message: String,
        data: Option<Value>,
    },
}

impl ProtocolError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::InternalError {
            message: message.into(),
            data: Some(data),
        }
    }

    /// Numeric code for this error kind
    pub fn code(&self) -> i32 {
        match self {
            Self::Unauthorized(_) => codes::UNAUTHORIZED,
            Self::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::InvalidRequest(_) => codes::INVALID_REQUEST,
            Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::InternalError { .. } => codes::INTERNAL_ERROR,
        }
    }

    /// Convert into the wire error object
    pub fn to_error_object(&self) -> ErrorObject {
        let data = match self {
            Self::InternalError { data, .. } => data.clone(),
            _ => None,
        };
        ErrorObject {
            code: self.code(),
            message: self.to_string(),
            data,
        }
    }
}

/// Wire representation of an error: `{code, message, data?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(codes::PARSE_ERROR, "Parse error")
    }
}

impl From<ProtocolError> for ErrorObject {
    fn from(err: ProtocolError) -> Self {
        err.to_error_object()
    }
}

/// Error returned by user middleware.
///
/// `Protocol` errors travel through the pipeline untouched. `Other` errors are
/// normalized into [`ProtocolError::InternalError`] by the pipeline.
#[derive(Error, Debug)]
pub enum MiddlewareError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MiddlewareError {
    /// Collapse into a protocol error, wrapping foreign failures exactly once
    pub fn into_protocol(self) -> ProtocolError {
        match self {
            Self::Protocol(err) => err,
            Self::Other(err) => ProtocolError::internal(format!("Middleware error: {err:#}")),
        }
    }
}

/// Capability kind, used in registration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool => write!(f, "tool"),
            Self::Resource => write!(f, "resource"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// Registration-time errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate {kind} registration: {key}")]
    Duplicate { kind: CapabilityKind, key: String },
}
