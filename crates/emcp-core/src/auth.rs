//! Authentication gate
//!
//! A single predicate evaluated once per request, installed as the outermost
//! middleware. A handler that errors counts as "not authenticated".

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{MiddlewareError, ProtocolError};
use crate::message::{McpRequest, McpResponse};
use crate::pipeline::{Middleware, Next};

/// The slice of the request an authentication handler gets to see
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub headers: Option<HashMap<String, String>>,
}

impl AuthRequest {
    /// Header lookup by lowercase name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()
            .and_then(|h| h.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }
}

/// Decides whether a request may proceed
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    async fn authenticate(&self, request: AuthRequest) -> anyhow::Result<bool>;
}

#[async_trait]
impl<F, Fut> AuthenticationHandler for F
where
    F: Fn(AuthRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    async fn authenticate(&self, request: AuthRequest) -> anyhow::Result<bool> {
        (self)(request).await
    }
}

/// Accepts requests carrying a fixed key in a header
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    header: String,
    key: String,
}

impl ApiKeyAuth {
    pub fn new(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl AuthenticationHandler for ApiKeyAuth {
    async fn authenticate(&self, request: AuthRequest) -> anyhow::Result<bool> {
        Ok(request.header(&self.header) == Some(self.key.as_str()))
    }
}

/// Middleware wrapper around an [`AuthenticationHandler`]
#[derive(Clone)]
pub struct AuthGate {
    handler: Arc<dyn AuthenticationHandler>,
}

impl AuthGate {
    pub fn new(handler: Arc<dyn AuthenticationHandler>) -> Self {
        Self { handler }
    }

    /// Gate backed by an async closure
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(AuthRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        Self::new(Arc::new(f))
    }

    /// Evaluate the handler; errors are logged and count as failure
    pub async fn check(&self, headers: Option<HashMap<String, String>>) -> bool {
        match self.handler.authenticate(AuthRequest { headers }).await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                error!("Authentication handler failed: {:#}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Middleware for AuthGate {
    async fn handle(&self, request: McpRequest, next: Next) -> Result<McpResponse, MiddlewareError> {
        if !self.check(request.headers.clone()).await {
            debug!("Rejecting unauthenticated {} request", request.method);
            return Err(ProtocolError::Unauthorized("Request authentication failed".to_string()).into());
        }
        Ok(next.run(request).await?)
    }
}
