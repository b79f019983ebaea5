//! Server capabilities

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityRegistry;

/// Server capabilities advertised during initialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
}

impl ServerCapabilities {
    /// Derive the advertisement from the registry.
    ///
    /// Logging is always advertised; each capability family only when at
    /// least one entry is registered.
    pub fn from_registry(registry: &CapabilityRegistry) -> Self {
        Self {
            tools: (!registry.tools().is_empty()).then(ToolsCapability::default),
            resources: (!registry.resources().is_empty()).then(ResourcesCapability::default),
            prompts: (!registry.prompts().is_empty()).then(PromptsCapability::default),
            logging: Some(LoggingCapability::default()),
        }
    }
}

/// Tools capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resources capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Prompts capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Logging capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Tool;
    use serde_json::json;

    #[test]
    fn test_empty_registry_advertises_logging_only() {
        let registry = CapabilityRegistry::new();
        let caps = ServerCapabilities::from_registry(&registry);

        assert_eq!(serde_json::to_value(&caps).unwrap(), json!({"logging": {}}));
    }

    #[test]
    fn test_tools_advertised_when_registered() {
        let mut registry = CapabilityRegistry::new();
        registry
            .add_tool(Tool::new("echo", |args| async move { Ok(args) }))
            .unwrap();

        let caps = ServerCapabilities::from_registry(&registry);
        assert!(caps.tools.is_some());
        assert!(caps.resources.is_none());
        assert!(caps.prompts.is_none());
    }
}
