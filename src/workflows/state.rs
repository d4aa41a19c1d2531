use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::generation::ToolCall;

/// Who authored a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Human,
    Assistant,
    Tool,
}

/// One entry in a session's conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(Role::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            tool_name: Some(call.name.clone()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// Mutable state of a single drafting session.
///
/// Only the generation, tool, feedback and publishing steps of the engine
/// write to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub draft_content: String,
    pub feedback: String,
    pub approved: bool,
    #[serde(default)]
    pub revision_count: u32,
    #[serde(default)]
    pub tool_rounds: u32,
}

impl SessionState {
    /// Fresh state holding only the opening request
    pub fn new(initial_request: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(initial_request)],
            ..Default::default()
        }
    }

    /// True when the next generation must revise the current draft
    pub fn needs_revision(&self) -> bool {
        !self.approved && !self.feedback.trim().is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Tool calls requested by the newest entry, if it is an assistant response
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => &message.tool_calls,
            _ => &[],
        }
    }

    pub fn has_system_instruction(&self) -> bool {
        matches!(self.messages.first(), Some(m) if m.role == Role::System)
    }

    /// Record a model response and reset the review fields
    pub fn record_response(&mut self, response: Message) {
        self.draft_content = response.content.clone();
        self.messages.push(response);
        self.feedback.clear();
        self.approved = false;
    }
}

/// Why a session stopped without publishing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbandonmentReason {
    RevisionLimitExceeded { max_revisions: u32 },
    ToolRoundLimitExceeded { max_tool_rounds: u32 },
}

impl fmt::Display for AbandonmentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonmentReason::RevisionLimitExceeded { max_revisions } => {
                write!(f, "revision limit of {max_revisions} exceeded")
            }
            AbandonmentReason::ToolRoundLimitExceeded { max_tool_rounds } => {
                write!(f, "more than {max_tool_rounds} consecutive tool rounds requested")
            }
        }
    }
}

/// Position of a session in the drafting workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum WorkflowStage {
    Drafting,
    ToolUse,
    AwaitingFeedback,
    Publishing,
    Done,
    Abandoned { reason: AbandonmentReason },
}

impl WorkflowStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Done | WorkflowStage::Abandoned { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, WorkflowStage::AwaitingFeedback)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStage::Drafting => "drafting",
            WorkflowStage::ToolUse => "tool_use",
            WorkflowStage::AwaitingFeedback => "awaiting_feedback",
            WorkflowStage::Publishing => "publishing",
            WorkflowStage::Done => "done",
            WorkflowStage::Abandoned { .. } => "abandoned",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
