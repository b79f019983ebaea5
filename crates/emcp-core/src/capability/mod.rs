//! Capability definitions (tools, resources, prompts) and their registry

mod prompt;
mod registry;
mod resource;
mod tool;

pub use prompt::{Prompt, PromptArgument, PromptArguments};
pub use registry::CapabilityRegistry;
pub use resource::Resource;
pub use tool::Tool;
