//! Tools the model may call while drafting.
//!
//! [`ToolExecutor`] is the only entry point the engine uses. It never fails:
//! unknown tools and tool errors come back as text for the model to read.

pub mod search;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::generation::{ToolCall, ToolDefinition};
use crate::observability::WorkflowMetrics;
use crate::workflows::state::Message;

pub use search::SearchTool;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn invoke(&self, arguments: &Value) -> Result<String, ToolError>;
}

/// Name-indexed set of tools
#[derive(Default, Clone)]
pub struct ToolExecutor {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Count calls and failures into `metrics`
    pub fn attach_metrics(&mut self, metrics: Arc<WorkflowMetrics>) {
        self.metrics = Some(metrics);
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Run one tool and return its output or an error description
    pub async fn run_tool(&self, name: &str, arguments: &Value) -> String {
        if let Some(metrics) = &self.metrics {
            metrics.record_tool_call();
        }

        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Model requested an unknown tool");
            self.record_failure();
            return format!("Error: unknown tool '{name}'");
        };

        match tool.invoke(arguments).await {
            Ok(output) => {
                info!(tool = %name, bytes = output.len(), "Tool call completed");
                output
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                self.record_failure();
                format!("Error: {name} failed: {e}")
            }
        }
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_tool_failure();
        }
    }

    /// Execute calls in order, one tool-result entry per call
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let output = self.run_tool(&call.name, &call.arguments).await;
            results.push(Message::tool_result(call, output));
        }
        results
    }
}
