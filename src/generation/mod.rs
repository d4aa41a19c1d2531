//! Language-model generation contract.
//!
//! The engine only sees the [`Generator`] trait. A response comes back as a
//! [`GenerationOutcome`] so the caller has to decide explicitly between the
//! text-only and tool-calling branches.

pub mod chat_completions;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::workflows::state::Message;

pub use chat_completions::ChatCompletionsGenerator;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Tool description offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Result of one generation call
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    TextOnly { content: String },
    WithToolCalls { content: String, calls: Vec<ToolCall> },
}

impl GenerationOutcome {
    /// Build the tagged outcome from raw response parts
    pub fn from_parts(content: String, calls: Vec<ToolCall>) -> Self {
        if calls.is_empty() {
            GenerationOutcome::TextOnly { content }
        } else {
            GenerationOutcome::WithToolCalls { content, calls }
        }
    }

    pub fn content(&self) -> &str {
        match self {
            GenerationOutcome::TextOnly { content }
            | GenerationOutcome::WithToolCalls { content, .. } => content,
        }
    }

    /// Conversation entry that records this response
    pub fn into_message(self) -> Message {
        match self {
            GenerationOutcome::TextOnly { content } => Message::assistant(content),
            GenerationOutcome::WithToolCalls { content, calls } => {
                Message::assistant_with_tool_calls(content, calls)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Authentication failed for {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by model provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Model request failed: {0}")]
    Transport(String),

    #[error("Could not parse model response: {message}")]
    ResponseParse { message: String },
}

/// Prompt completion with optional tool calling
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<GenerationOutcome, GenerationError>;
}
