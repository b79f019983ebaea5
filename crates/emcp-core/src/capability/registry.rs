//! Registry of tools, resources and prompts

use indexmap::IndexMap;
use tracing::debug;

use super::{Prompt, Resource, Tool};
use crate::error::{CapabilityKind, RegistryError};

/// Ordered, append-only capability collections.
///
/// Filled at configuration time, then shared read-only behind an `Arc` while
/// requests are served. Insertion order is listing order.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    tools: IndexMap<String, Tool>,
    resources: IndexMap<String, Resource>,
    prompts: IndexMap<String, Prompt>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique.
    pub fn add_tool(&mut self, tool: Tool) -> Result<(), RegistryError> {
        if self.tools.contains_key(&tool.name) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Tool,
                key: tool.name,
            });
        }
        debug!("Registered tool: {}", tool.name);
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Register a resource. URIs are unique.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), RegistryError> {
        if self.resources.contains_key(&resource.uri) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Resource,
                key: resource.uri,
            });
        }
        debug!("Registered resource: {}", resource.uri);
        self.resources.insert(resource.uri.clone(), resource);
        Ok(())
    }

    /// Register a prompt. Names are unique.
    pub fn add_prompt(&mut self, prompt: Prompt) -> Result<(), RegistryError> {
        if self.prompts.contains_key(&prompt.name) {
            return Err(RegistryError::Duplicate {
                kind: CapabilityKind::Prompt,
                key: prompt.name,
            });
        }
        debug!("Registered prompt: {}", prompt.name);
        self.prompts.insert(prompt.name.clone(), prompt);
        Ok(())
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    pub fn prompt(&self, name: &str) -> Option<&Prompt> {
        self.prompts.get(name)
    }

    pub fn tools(&self) -> &IndexMap<String, Tool> {
        &self.tools
    }

    pub fn resources(&self) -> &IndexMap<String, Resource> {
        &self.resources
    }

    pub fn prompts(&self) -> &IndexMap<String, Prompt> {
        &self.prompts
    }
}
