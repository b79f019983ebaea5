//! Middleware stack execution

use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

use super::{Middleware, Next, PipelineContext, TerminalHandler};
use crate::error::ProtocolError;
use crate::message::{McpRequest, McpResponse};

/// Ordered collection of middleware, still open for registration.
///
/// The optional gate always sits in front of every pushed middleware,
/// whenever it was set.
#[derive(Default, Clone)]
pub struct MiddlewareStack {
    gate: Option<Arc<dyn Middleware>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add middleware to the end of the stack
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Install the outermost middleware (the authentication gate)
    pub fn set_gate(&mut self, gate: Arc<dyn Middleware>) {
        self.gate = Some(gate);
    }

    /// Number of stages, gate included
    pub fn len(&self) -> usize {
        self.middleware.len() + usize::from(self.gate.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the current registrations into an immutable pipeline
    pub fn freeze(&self) -> Pipeline {
        let chain: Vec<Arc<dyn Middleware>> = self
            .gate
            .iter()
            .chain(self.middleware.iter())
            .cloned()
            .collect();
        Pipeline {
            chain: chain.into(),
        }
    }
}

/// Immutable middleware chain, shared by every in-flight request
#[derive(Clone)]
pub struct Pipeline {
    chain: Arc<[Arc<dyn Middleware>]>,
}

impl Default for Pipeline {
    fn default() -> Self {
        MiddlewareStack::new().freeze()
    }
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Run `request` through every middleware and then `terminal`.
    ///
    /// Single pass, no retries. Every failure leaving this call is a
    /// [`ProtocolError`].
    pub async fn execute(
        &self,
        request: McpRequest,
        terminal: Arc<dyn TerminalHandler>,
    ) -> Result<McpResponse, ProtocolError> {
        let context = PipelineContext::new(&request);
        let span = info_span!("mcp_request", id = %context.id, method = %context.method);

        let next = Next::start(self.chain.clone(), terminal);
        async move {
            debug!(stages = self.chain.len(), "pipeline started");
            let result = next.run(request).await;
            match &result {
                Ok(_) => debug!(elapsed = ?context.elapsed(), "pipeline finished"),
                Err(e) => debug!(elapsed = ?context.elapsed(), code = e.code(), "pipeline failed: {}", e),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MiddlewareError;
    use crate::pipeline::{from_fn, terminal_fn};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    struct TracingMiddleware {
        id: String,
        trace: Trace,
    }

    #[async_trait]
    impl Middleware for TracingMiddleware {
        async fn handle(&self, request: McpRequest, next: Next) -> Result<McpResponse, MiddlewareError> {
            self.trace.lock().unwrap().push(format!("before_{}", self.id));
            let response = next.run(request).await?;
            self.trace.lock().unwrap().push(format!("after_{}", self.id));
            Ok(response)
        }
    }

    fn traced(id: &str, trace: &Trace) -> Arc<dyn Middleware> {
        Arc::new(TracingMiddleware {
            id: id.to_string(),
            trace: trace.clone(),
        })
    }

    fn recording_terminal(trace: &Trace) -> Arc<dyn TerminalHandler> {
        let trace = trace.clone();
        terminal_fn(move |request: McpRequest| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push("handler".to_string());
                Ok(McpResponse::content(Value::Object(request.params)))
            }
        })
    }

    #[tokio::test]
    async fn test_onion_ordering() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        for id in ["m0", "m1", "m2"] {
            stack.push(traced(id, &trace));
        }

        stack
            .freeze()
            .execute(McpRequest::new("tools/list"), recording_terminal(&trace))
            .await
            .unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["before_m0", "before_m1", "before_m2", "handler", "after_m2", "after_m1", "after_m0"]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_terminal() {
        let trace: Trace = Arc::default();
        let response = Pipeline::default()
            .execute(
                McpRequest::new("tools/list").with_param("k", json!(1)),
                recording_terminal(&trace),
            )
            .await
            .unwrap();

        assert_eq!(response.content, Some(json!({"k": 1})));
        assert_eq!(*trace.lock().unwrap(), vec!["handler"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_stages() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(traced("m0", &trace));
        stack.push(Arc::new(from_fn(|_request, _next: Next| async move {
            Ok(McpResponse::content(json!("cached")))
        })));
        stack.push(traced("m2", &trace));

        let response = stack
            .freeze()
            .execute(McpRequest::new("tools/list"), recording_terminal(&trace))
            .await
            .unwrap();

        assert_eq!(response, McpResponse::content(json!("cached")));
        assert_eq!(*trace.lock().unwrap(), vec!["before_m0", "after_m0"]);
    }

    #[tokio::test]
    async fn test_request_mutation_visible_to_inner_stages() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(from_fn(|mut request: McpRequest, next: Next| async move {
            request.params.insert("timestamp".into(), json!("now"));
            request.params.remove("secret");
            Ok(next.run(request).await?)
        })));

        let request = McpRequest::new("tools/call")
            .with_param("secret", json!("s3cr3t"))
            .with_param("name", json!("add"));
        let response = stack
            .freeze()
            .execute(request, recording_terminal(&trace))
            .await
            .unwrap();

        assert_eq!(response.content, Some(json!({"name": "add", "timestamp": "now"})));
    }

    #[tokio::test]
    async fn test_post_processing_visible_to_outer_only() {
        let seen_by_inner: Arc<Mutex<Option<Value>>> = Arc::default();
        let seen_by_outer: Arc<Mutex<Option<Value>>> = Arc::default();

        let mut stack = MiddlewareStack::new();
        let outer = seen_by_outer.clone();
        stack.push(Arc::new(from_fn(move |request, next: Next| {
            let outer = outer.clone();
            async move {
                let response = next.run(request).await?;
                *outer.lock().unwrap() = response.content.clone();
                Ok(response)
            }
        })));
        stack.push(Arc::new(from_fn(|request, next: Next| async move {
            let mut response = next.run(request).await?;
            response.content = Some(json!({"data": response.content, "wrapped": true}));
            Ok(response)
        })));
        let inner = seen_by_inner.clone();
        stack.push(Arc::new(from_fn(move |request, next: Next| {
            let inner = inner.clone();
            async move {
                let response = next.run(request).await?;
                *inner.lock().unwrap() = response.content.clone();
                Ok(response)
            }
        })));

        let terminal = terminal_fn(|_request| async { Ok(McpResponse::content(json!("raw"))) });
        stack
            .freeze()
            .execute(McpRequest::new("tools/list"), terminal)
            .await
            .unwrap();

        assert_eq!(*seen_by_inner.lock().unwrap(), Some(json!("raw")));
        assert_eq!(
            *seen_by_outer.lock().unwrap(),
            Some(json!({"data": "raw", "wrapped": true}))
        );
    }

    #[tokio::test]
    async fn test_foreign_middleware_error_becomes_internal() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(from_fn(|_request, _next: Next| async move {
            Err(anyhow::anyhow!("quota store unreachable").into())
        })));

        let err = stack
            .freeze()
            .execute(McpRequest::new("tools/list"), recording_terminal(&trace))
            .await
            .unwrap_err();

        assert_eq!(err, ProtocolError::internal("Middleware error: quota store unreachable"));
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_protocol_error_passes_through_every_layer_unchanged() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(traced("m0", &trace));
        stack.push(traced("m1", &trace));

        let terminal = terminal_fn(|_request| async {
            Err(ProtocolError::MethodNotFound("Unknown tool: nope".to_string()))
        });
        let err = stack
            .freeze()
            .execute(McpRequest::new("tools/call"), terminal)
            .await
            .unwrap_err();

        assert_eq!(err, ProtocolError::MethodNotFound("Unknown tool: nope".to_string()));
        // Post phases never ran because `?` propagated the error outward.
        assert_eq!(*trace.lock().unwrap(), vec!["before_m0", "before_m1"]);
    }

    #[tokio::test]
    async fn test_foreign_error_wrapped_once_across_layers() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(from_fn(|request, next: Next| async move {
            Ok(next.run(request).await?)
        })));
        stack.push(Arc::new(from_fn(|_request, _next: Next| async move {
            Err(MiddlewareError::Other(anyhow::anyhow!("boom")))
        })));

        let terminal = terminal_fn(|_request| async { Ok(McpResponse::default()) });
        let err = stack
            .freeze()
            .execute(McpRequest::new("tools/list"), terminal)
            .await
            .unwrap_err();

        assert_eq!(err, ProtocolError::internal("Middleware error: boom"));
    }

    #[tokio::test]
    async fn test_gate_is_outermost_regardless_of_registration_time() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(traced("user", &trace));
        stack.set_gate(traced("gate", &trace));

        assert_eq!(stack.len(), 2);
        stack
            .freeze()
            .execute(McpRequest::new("tools/list"), recording_terminal(&trace))
            .await
            .unwrap();

        assert_eq!(
            *trace.lock().unwrap(),
            vec!["before_gate", "before_user", "handler", "after_user", "after_gate"]
        );
    }

    #[tokio::test]
    async fn test_frozen_pipeline_ignores_later_registrations() {
        let trace: Trace = Arc::default();
        let mut stack = MiddlewareStack::new();
        stack.push(traced("m0", &trace));
        let pipeline = stack.freeze();
        stack.push(traced("late", &trace));

        pipeline
            .execute(McpRequest::new("tools/list"), recording_terminal(&trace))
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["before_m0", "handler", "after_m0"]);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let mut stack = MiddlewareStack::new();
        stack.push(Arc::new(from_fn(|mut request: McpRequest, next: Next| async move {
            let n = request.params["n"].as_i64().unwrap_or_default();
            request.params.insert("double".into(), json!(n * 2));
            tokio::task::yield_now().await;
            Ok(next.run(request).await?)
        })));
        let pipeline = stack.freeze();
        let terminal = terminal_fn(|request: McpRequest| async move {
            tokio::task::yield_now().await;
            Ok(McpResponse::content(Value::Object(request.params)))
        });

        let handles: Vec<_> = (0..32)
            .map(|n| {
                let pipeline = pipeline.clone();
                let terminal = terminal.clone();
                tokio::spawn(async move {
                    let request = McpRequest::new("tools/call").with_param("n", json!(n));
                    pipeline.execute(request, terminal).await
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.content, Some(json!({"n": n, "double": n * 2})));
        }
    }
}
