// Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use post_pilot::generation::{GenerationError, GenerationOutcome, Generator, ToolCall, ToolDefinition};
use post_pilot::publish::{PublishOutcome, Publisher};
use post_pilot::workflows::{Message, RunOutcome};

/// Generator that replays queued responses and records each request
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<GenerationOutcome, GenerationError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    offered_tools: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<GenerationOutcome, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
    }

    /// Every call returns a numbered draft
    pub fn drafts() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn offered_tools(&self) -> Vec<Vec<String>> {
        self.offered_tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<GenerationOutcome, GenerationError> {
        let call_number = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(conversation.to_vec());
            requests.len()
        };
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|tool| tool.name.clone()).collect());

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text(&format!("Draft v{call_number}"))))
    }
}

/// Publisher that records what it was asked to publish
pub struct RecordingPublisher {
    outcome: PublishOutcome,
    published: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            outcome: PublishOutcome::Published {
                content: "Post created successfully".to_string(),
                status_code: 201,
                post_id: Some("urn:li:share:7000000000000000000".to_string()),
            },
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: &str, status_code: u16) -> Arc<Self> {
        Arc::new(Self {
            outcome: PublishOutcome::Failed {
                error: error.to_string(),
                status_code: Some(status_code),
            },
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, text: &str) -> PublishOutcome {
        self.published.lock().unwrap().push(text.to_string());
        self.outcome.clone()
    }
}

pub fn text(content: &str) -> GenerationOutcome {
    GenerationOutcome::TextOnly {
        content: content.to_string(),
    }
}

pub fn search_request(id: &str, query: &str) -> GenerationOutcome {
    GenerationOutcome::WithToolCalls {
        content: String::new(),
        calls: vec![ToolCall {
            id: id.to_string(),
            name: "search".to_string(),
            arguments: serde_json::json!({ "query": query }),
        }],
    }
}

pub fn suspended_draft(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Suspended { payload, .. } => payload.current_draft.clone(),
        other => panic!("expected a suspended session, got {other:?}"),
    }
}
