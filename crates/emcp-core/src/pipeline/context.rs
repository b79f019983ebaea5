use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::message::McpRequest;

/// Per-traversal bookkeeping.
///
/// One is created for every inbound call and never shared. The request and
/// response themselves move through the stages by value.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub id: Uuid,
    pub method: String,
    started: Instant,
}

impl PipelineContext {
    pub fn new(request: &McpRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: request.method.clone(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
