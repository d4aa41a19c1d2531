//! Publishing of approved drafts.

pub mod linkedin;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use linkedin::LinkedInPublisher;

/// Structured result of the single publish call a session makes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published {
        content: String,
        status_code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_id: Option<String>,
    },
    Failed {
        error: String,
        /// None when the request never got a response
        status_code: Option<u16>,
    },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }

    /// Text recorded as the session's final assistant message
    pub fn message_text(&self) -> &str {
        match self {
            PublishOutcome::Published { content, .. } => content,
            PublishOutcome::Failed { error, .. } => error,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher is not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to build publisher: {0}")]
    Build(String),
}

/// One-shot publication of a post
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `text`. Failures are reported in the outcome, never raised.
    async fn publish(&self, text: &str) -> PublishOutcome;
}
