// Post Pilot Library - LinkedIn post drafting with human review
// Exposes the workflow engine and its adapters for embedding and testing

pub mod config;
pub mod generation;
pub mod http;
pub mod observability;
pub mod publish;
pub mod telemetry;
pub mod tools;
pub mod workflows;

// Re-export key types for easy access
pub use config::PostPilotConfig;
pub use generation::{ChatCompletionsGenerator, GenerationError, GenerationOutcome, Generator};
pub use http::RateLimitedHttpClient;
pub use observability::{OperationTimer, WorkflowMetrics, WorkflowStats};
pub use publish::{LinkedInPublisher, PublishOutcome, Publisher};
pub use telemetry::{create_session_span, generate_correlation_id, init_telemetry};
pub use tools::{SearchTool, Tool, ToolExecutor};
pub use workflows::{
    FileSystemSessionStore, InMemorySessionStore, RunOutcome, SessionRecord, SessionState,
    SessionStore, WorkflowEngine, WorkflowError, WorkflowStage,
};
