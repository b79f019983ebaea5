use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::protocol::ToolDescriptor;

type ExecuteFn = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A callable tool.
///
/// `parameters` is an optional JSON Schema the call arguments are validated
/// against before `execute` runs.
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
    execute: ExecuteFn,
}

impl Tool {
    pub fn new<F, Fut>(name: impl Into<String>, execute: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
            execute: Arc::new(move |args| Box::pin(execute(args))),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, schema: Value) -> Self {
        self.parameters = Some(schema);
        self
    }

    /// Run the tool body
    pub async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        (self.execute)(args).await
    }

    /// Listing metadata. Tools without a schema advertise an open object.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self
                .parameters
                .clone()
                .unwrap_or_else(|| json!({"type": "object"})),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
