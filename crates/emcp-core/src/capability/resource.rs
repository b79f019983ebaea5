use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::protocol::{ResourceBody, ResourceContents, ResourceDescriptor};

type LoadFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ResourceBody>> + Send + Sync>;

/// A readable resource, keyed by URI
#[derive(Clone)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    load: LoadFn,
}

impl Resource {
    pub fn new<F, Fut>(uri: impl Into<String>, name: impl Into<String>, load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ResourceBody>> + Send + 'static,
    {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            load: Arc::new(move || Box::pin(load())),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub async fn load(&self) -> anyhow::Result<ResourceBody> {
        (self.load)().await
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }

    /// Merge a loaded body with this resource's uri and mime type
    pub fn contents(&self, body: ResourceBody) -> ResourceContents {
        ResourceContents {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            body,
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}
