use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::protocol::PromptDescriptor;

/// Arguments supplied to a prompt, by name
pub type PromptArguments = HashMap<String, String>;

type LoadFn = Arc<dyn Fn(PromptArguments) -> BoxFuture<'static, anyhow::Result<String>> + Send + Sync>;

/// Declared prompt argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl PromptArgument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: Some(true),
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

/// A prompt template rendered to text by its loader
#[derive(Clone)]
pub struct Prompt {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Option<Vec<PromptArgument>>,
    load: LoadFn,
}

impl Prompt {
    pub fn new<F, Fut>(name: impl Into<String>, load: F) -> Self
    where
        F: Fn(PromptArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            arguments: None,
            load: Arc::new(move |args| Box::pin(load(args))),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a declared argument; declaration order is preserved
    pub fn with_argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.get_or_insert_with(Vec::new).push(argument);
        self
    }

    pub async fn load(&self, args: PromptArguments) -> anyhow::Result<String> {
        (self.load)(args).await
    }

    /// First required argument, in declaration order, absent from `args`
    pub fn missing_required(&self, args: &PromptArguments) -> Option<&str> {
        self.arguments
            .iter()
            .flatten()
            .find(|arg| arg.is_required() && !args.contains_key(&arg.name))
            .map(|arg| arg.name.as_str())
    }

    pub fn descriptor(&self) -> PromptDescriptor {
        PromptDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prompt")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}
