//! Middleware and terminal handler traits

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::{MiddlewareError, ProtocolError};
use crate::message::{McpRequest, McpResponse};

/// Interceptor wrapped around the rest of the pipeline.
///
/// An implementation may
/// - change the request before calling `next.run(request)`,
/// - return its own response without calling `next` at all,
/// - await `next` and rewrite the response it gets back.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use emcp_core::{McpRequest, McpResponse, MiddlewareError};
/// use emcp_core::pipeline::{Middleware, Next};
///
/// struct StampMiddleware;
///
/// #[async_trait]
/// impl Middleware for StampMiddleware {
///     async fn handle(&self, mut request: McpRequest, next: Next) -> Result<McpResponse, MiddlewareError> {
///         request.params.insert("stamped".into(), true.into());
///         Ok(next.run(request).await?)
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: McpRequest, next: Next) -> Result<McpResponse, MiddlewareError>;
}

/// Innermost stage of the pipeline
#[async_trait]
pub trait TerminalHandler: Send + Sync {
    async fn call(&self, request: McpRequest) -> Result<McpResponse, ProtocolError>;
}

#[async_trait]
impl<F, Fut> TerminalHandler for F
where
    F: Fn(McpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<McpResponse, ProtocolError>> + Send + 'static,
{
    async fn call(&self, request: McpRequest) -> Result<McpResponse, ProtocolError> {
        (self)(request).await
    }
}

/// Wrap an async closure as a shareable terminal handler
pub fn terminal_fn<F, Fut>(f: F) -> Arc<dyn TerminalHandler>
where
    F: Fn(McpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<McpResponse, ProtocolError>> + Send + 'static,
{
    Arc::new(f)
}

/// Continuation handed to each middleware.
///
/// Owns a snapshot of the chain, so middleware registered after a request
/// started can never run for it.
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    terminal: Arc<dyn TerminalHandler>,
}

impl Next {
    pub(crate) fn start(chain: Arc<[Arc<dyn Middleware>]>, terminal: Arc<dyn TerminalHandler>) -> Self {
        Self {
            chain,
            index: 0,
            terminal,
        }
    }

    /// Run every remaining stage and return its response.
    ///
    /// Errors coming out of this call are already normalized: protocol errors
    /// are untouched, anything else became an internal error at the layer that
    /// raised it.
    pub async fn run(self, request: McpRequest) -> Result<McpResponse, ProtocolError> {
        let stage = self.chain.get(self.index).cloned();
        match stage {
            None => self.terminal.call(request).await,
            Some(middleware) => {
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                middleware
                    .handle(request, next)
                    .await
                    .map_err(MiddlewareError::into_protocol)
            }
        }
    }
}

/// Middleware built from an async closure
pub struct FromFn<F> {
    f: F,
}

/// Turn an async closure into [`Middleware`].
///
/// ```rust
/// use emcp_core::pipeline::{from_fn, Next};
///
/// let timer = from_fn(|request, next: Next| async move {
///     let started = std::time::Instant::now();
///     let response = next.run(request).await?;
///     tracing::debug!(elapsed = ?started.elapsed(), "request finished");
///     Ok(response)
/// });
/// # let _ = timer;
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(McpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<McpResponse, MiddlewareError>> + Send + 'static,
{
    FromFn { f }
}

#[async_trait]
impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(McpRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<McpResponse, MiddlewareError>> + Send + 'static,
{
    async fn handle(&self, request: McpRequest, next: Next) -> Result<McpResponse, MiddlewareError> {
        (self.f)(request, next).await
    }
}
