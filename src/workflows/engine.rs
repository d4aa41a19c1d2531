//! Resumable drafting workflow.
//!
//! The engine moves a session through
//! `Drafting -> (ToolUse -> Drafting)* -> AwaitingFeedback -> ... -> Publishing -> Done`
//! and writes the [`SessionRecord`] to the store after every transition. A
//! session suspended in `AwaitingFeedback` survives process restarts: any engine
//! pointed at the same store can resume it.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn, Instrument};

use super::feedback::{FeedbackDecision, SuspendPayload};
use super::persistence::{
    validate_session_id, CheckpointReason, SessionRecord, SessionStore, StoreError,
};
use super::state::{AbandonmentReason, Message, SessionState, WorkflowStage};
use crate::config::WorkflowConfig;
use crate::generation::{GenerationError, GenerationOutcome, Generator};
use crate::observability::{OperationTimer, WorkflowMetrics, WorkflowStats};
use crate::publish::{PublishOutcome, Publisher};
use crate::telemetry::{create_session_span, generate_correlation_id};
use crate::tools::ToolExecutor;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Session {session_id} already exists")]
    SessionExists { session_id: String },

    #[error("Session {session_id} not found")]
    SessionNotFound { session_id: String },

    #[error("Session {session_id} is not awaiting feedback (stage: {stage})")]
    NotSuspended { session_id: String, stage: String },

    #[error("Session {session_id} has no failed step to retry (stage: {stage})")]
    NothingToRetry { session_id: String, stage: String },

    #[error("Invalid session id {session_id:?}: use 1-128 characters from [A-Za-z0-9_-]")]
    InvalidSessionId { session_id: String },

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Where an entry operation left the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Suspended {
        session_id: String,
        payload: SuspendPayload,
    },
    Completed {
        session_id: String,
        final_message: String,
        outcome: PublishOutcome,
    },
    Abandoned {
        session_id: String,
        reason: AbandonmentReason,
    },
}

impl RunOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            RunOutcome::Suspended { session_id, .. }
            | RunOutcome::Completed { session_id, .. }
            | RunOutcome::Abandoned { session_id, .. } => session_id,
        }
    }

    /// Outcome implied by a stored record, if it is at rest
    pub fn for_record(record: &SessionRecord) -> Option<Self> {
        let session_id = record.session_id.clone();
        match &record.stage {
            WorkflowStage::AwaitingFeedback => Some(RunOutcome::Suspended {
                session_id,
                payload: SuspendPayload::for_state(&record.state),
            }),
            WorkflowStage::Done => record.publish_outcome.clone().map(|outcome| {
                RunOutcome::Completed {
                    session_id,
                    final_message: outcome.message_text().to_string(),
                    outcome,
                }
            }),
            WorkflowStage::Abandoned { reason } => Some(RunOutcome::Abandoned {
                session_id,
                reason: reason.clone(),
            }),
            WorkflowStage::Drafting | WorkflowStage::ToolUse | WorkflowStage::Publishing => None,
        }
    }
}

/// Final message of a session whose earlier publish call never saved its result
pub const PUBLISH_OUTCOME_UNKNOWN: &str = "Publish outcome unknown: an earlier attempt may \
     already have posted. Check the profile before posting this draft again.";

pub fn revision_request(draft_content: &str, feedback: &str) -> String {
    format!(
        "Original response: {draft_content}\n\nHuman feedback: {feedback}\n\n\
         Please revise the response based on the feedback provided."
    )
}

/// Drives sessions through generation, tool use, review and publishing
pub struct WorkflowEngine {
    generator: Arc<dyn Generator>,
    tools: ToolExecutor,
    publisher: Arc<dyn Publisher>,
    store: Arc<dyn SessionStore>,
    config: WorkflowConfig,
    metrics: Arc<WorkflowMetrics>,
    session_locks: SessionLocks,
}

type SessionLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Exclusive hold on one session. Dropping it removes the map entry unless
/// another call is already waiting on the same session.
struct SessionLockGuard<'a> {
    locks: &'a SessionLocks,
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = lock_map(self.locks);
        if locks
            .get(&self.session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session_id);
        }
    }
}

fn lock_map(locks: &SessionLocks) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(
        generator: Arc<dyn Generator>,
        publisher: Arc<dyn Publisher>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let metrics = Arc::new(WorkflowMetrics::new());
        let mut tools = ToolExecutor::new();
        tools.attach_metrics(metrics.clone());
        Self {
            generator,
            tools,
            publisher,
            store,
            config: WorkflowConfig::default(),
            metrics,
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_tools(mut self, mut tools: ToolExecutor) -> Self {
        tools.attach_metrics(self.metrics.clone());
        self.tools = tools;
        self
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a session and run it until it first needs a human
    pub async fn start(
        &self,
        session_id: &str,
        initial_request: &str,
    ) -> Result<RunOutcome, WorkflowError> {
        check_session_id(session_id)?;
        let span = create_session_span("start", session_id, &generate_correlation_id());

        async {
            let _guard = self.lock_session(session_id).await;

            if self.store.get(session_id).await?.is_some() {
                return Err(WorkflowError::SessionExists {
                    session_id: session_id.to_string(),
                });
            }

            let mut record = SessionRecord::new(session_id, SessionState::new(initial_request));
            self.store.put(&record, CheckpointReason::SessionCreated).await?;
            info!(session_id = %session_id, "Session created");

            self.run(&mut record).await
        }
        .instrument(span)
        .await
    }

    /// Apply reviewer input to a suspended session and continue it
    pub async fn resume(&self, session_id: &str, input: &str) -> Result<RunOutcome, WorkflowError> {
        check_session_id(session_id)?;
        let span = create_session_span("resume", session_id, &generate_correlation_id());

        async {
            let _guard = self.lock_session(session_id).await;
            let mut record = self.load(session_id).await?;

            if !record.stage.is_suspended() {
                warn!(session_id = %session_id, stage = %record.stage, "Resume on a session that is not suspended");
                return Err(WorkflowError::NotSuspended {
                    session_id: session_id.to_string(),
                    stage: record.stage.name().to_string(),
                });
            }

            let timer = OperationTimer::new("feedback");
            let decision = FeedbackDecision::from_input(input);
            decision.apply(&mut record.state);

            if decision.is_approval() {
                info!(session_id = %session_id, "Draft approved");
                self.advance(&mut record, WorkflowStage::Publishing, timer.finish())
                    .await?;
            } else {
                record.state.revision_count += 1;
                self.metrics.record_revision();
                info!(
                    session_id = %session_id,
                    revision_count = record.state.revision_count,
                    "Revision requested"
                );

                match self.config.max_revisions {
                    Some(max_revisions) if record.state.revision_count > max_revisions => {
                        let reason = AbandonmentReason::RevisionLimitExceeded { max_revisions };
                        return self.abandon(&mut record, reason, timer.finish()).await;
                    }
                    _ => {
                        self.advance(&mut record, WorkflowStage::Drafting, timer.finish())
                            .await?
                    }
                }
            }

            self.run(&mut record).await
        }
        .instrument(span)
        .await
    }

    /// Re-run the automated step a previous call failed on
    pub async fn retry(&self, session_id: &str) -> Result<RunOutcome, WorkflowError> {
        check_session_id(session_id)?;
        let span = create_session_span("retry", session_id, &generate_correlation_id());

        async {
            let _guard = self.lock_session(session_id).await;
            let mut record = self.load(session_id).await?;

            match record.stage {
                WorkflowStage::Drafting | WorkflowStage::ToolUse | WorkflowStage::Publishing => {
                    info!(session_id = %session_id, stage = %record.stage, "Retrying pending step");
                    self.run(&mut record).await
                }
                _ => Err(WorkflowError::NothingToRetry {
                    session_id: session_id.to_string(),
                    stage: record.stage.name().to_string(),
                }),
            }
        }
        .instrument(span)
        .await
    }

    /// Current stored record of a session
    pub async fn session(&self, session_id: &str) -> Result<Option<SessionRecord>, WorkflowError> {
        check_session_id(session_id)?;
        Ok(self.store.get(session_id).await?)
    }

    pub fn metrics(&self) -> WorkflowStats {
        self.metrics.get_stats()
    }

    pub fn log_metrics(&self) {
        self.metrics.log_stats();
    }

    async fn lock_session(&self, session_id: &str) -> SessionLockGuard<'_> {
        let lock = lock_map(&self.session_locks)
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        SessionLockGuard {
            locks: &self.session_locks,
            session_id: session_id.to_string(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn active_session_locks(&self) -> usize {
        lock_map(&self.session_locks).len()
    }

    async fn load(&self, session_id: &str) -> Result<SessionRecord, WorkflowError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| WorkflowError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Step the session until it suspends or terminates
    async fn run(&self, record: &mut SessionRecord) -> Result<RunOutcome, WorkflowError> {
        loop {
            match record.stage.clone() {
                WorkflowStage::Drafting => self.drafting_step(record).await?,
                WorkflowStage::ToolUse => self.tool_step(record).await?,
                WorkflowStage::Publishing => self.publishing_step(record).await?,
                WorkflowStage::AwaitingFeedback => {
                    self.metrics.record_suspension();
                    info!(session_id = %record.session_id, "Session suspended for feedback");
                    return Ok(RunOutcome::Suspended {
                        session_id: record.session_id.clone(),
                        payload: SuspendPayload::for_state(&record.state),
                    });
                }
                WorkflowStage::Done | WorkflowStage::Abandoned { .. } => {
                    if let Some(outcome) = RunOutcome::for_record(record) {
                        return Ok(outcome);
                    }
                    return Err(WorkflowError::NothingToRetry {
                        session_id: record.session_id.clone(),
                        stage: record.stage.name().to_string(),
                    });
                }
            }
        }
    }

    /// One generation call. A revision request is sent but never stored, and
    /// `record_response` clears the feedback, so when the model answers a
    /// revision with tool calls the follow-up generation sees the tool results
    /// without the reviewer's feedback.
    async fn drafting_step(&self, record: &mut SessionRecord) -> Result<(), WorkflowError> {
        let timer = OperationTimer::new("generation");
        let mut state = record.state.clone();

        let conversation = if state.needs_revision() {
            let mut conversation = state.messages.clone();
            conversation.push(Message::human(revision_request(
                &state.draft_content,
                &state.feedback,
            )));
            conversation
        } else {
            if !state.has_system_instruction() {
                state
                    .messages
                    .insert(0, Message::system(self.config.system_prompt.clone()));
            }
            state.messages.clone()
        };

        let outcome = match self
            .generator
            .generate(&conversation, &self.tools.definitions())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.record_generation_failure();
                warn!(session_id = %record.session_id, error = %e, "Generation step failed");
                return Err(e.into());
            }
        };
        self.metrics.record_generation();

        let next = match &outcome {
            GenerationOutcome::TextOnly { .. } => {
                state.tool_rounds = 0;
                WorkflowStage::AwaitingFeedback
            }
            GenerationOutcome::WithToolCalls { calls, .. } => {
                state.tool_rounds += 1;
                info!(
                    session_id = %record.session_id,
                    tool_calls = calls.len(),
                    tool_rounds = state.tool_rounds,
                    "Model requested tools"
                );
                WorkflowStage::ToolUse
            }
        };
        state.record_response(outcome.into_message());
        record.state = state;

        if let (WorkflowStage::ToolUse, Some(max_tool_rounds)) = (&next, self.config.max_tool_rounds) {
            if record.state.tool_rounds > max_tool_rounds {
                let reason = AbandonmentReason::ToolRoundLimitExceeded { max_tool_rounds };
                self.abandon(record, reason, timer.finish()).await?;
                return Ok(());
            }
        }

        self.advance(record, next, timer.finish()).await
    }

    async fn tool_step(&self, record: &mut SessionRecord) -> Result<(), WorkflowError> {
        let timer = OperationTimer::new("tool_use");
        let calls = record.state.pending_tool_calls().to_vec();
        let results = self.tools.execute_all(&calls).await;
        record.state.messages.extend(results);

        self.advance(record, WorkflowStage::Drafting, timer.finish()).await
    }

    /// The attempt marker is saved before the publisher runs, so a retry after
    /// a failed final save finishes the session instead of posting twice.
    async fn publishing_step(&self, record: &mut SessionRecord) -> Result<(), WorkflowError> {
        let timer = OperationTimer::new("publishing");

        let outcome = if record.publish_attempted {
            warn!(
                session_id = %record.session_id,
                "Earlier publish attempt left no saved result, not publishing again"
            );
            PublishOutcome::Failed {
                error: PUBLISH_OUTCOME_UNKNOWN.to_string(),
                status_code: None,
            }
        } else {
            record.publish_attempted = true;
            self.store
                .put(record, CheckpointReason::StageTransition)
                .await?;
            let outcome = self.publisher.publish(&record.state.draft_content).await;
            self.metrics.record_publish(outcome.is_published());
            outcome
        };

        record
            .state
            .messages
            .push(Message::assistant(outcome.message_text()));
        record.publish_outcome = Some(outcome);

        self.advance(record, WorkflowStage::Done, timer.finish()).await
    }

    async fn abandon(
        &self,
        record: &mut SessionRecord,
        reason: AbandonmentReason,
        duration_ms: u64,
    ) -> Result<RunOutcome, WorkflowError> {
        self.metrics.record_abandonment();
        warn!(session_id = %record.session_id, reason = %reason, "Session abandoned");
        self.advance(
            record,
            WorkflowStage::Abandoned {
                reason: reason.clone(),
            },
            duration_ms,
        )
        .await?;

        Ok(RunOutcome::Abandoned {
            session_id: record.session_id.clone(),
            reason,
        })
    }

    /// Transition and persist
    async fn advance(
        &self,
        record: &mut SessionRecord,
        to: WorkflowStage,
        duration_ms: u64,
    ) -> Result<(), WorkflowError> {
        let reason = if to.is_suspended() {
            CheckpointReason::BeforeSuspend
        } else if to.is_terminal() {
            CheckpointReason::Terminal
        } else {
            CheckpointReason::StageTransition
        };

        record.transition_to(to, duration_ms);
        self.store.put(record, reason).await?;
        Ok(())
    }
}

fn check_session_id(session_id: &str) -> Result<(), WorkflowError> {
    validate_session_id(session_id).map_err(|_| WorkflowError::InvalidSessionId {
        session_id: session_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ToolCall, ToolDefinition};
    use crate::publish::MockPublisher;
    use crate::tools::MockTool;
    use crate::workflows::persistence::InMemorySessionStore;
    use crate::workflows::state::Role;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Returns queued responses and records every conversation it was sent
    #[derive(Default)]
    struct ScriptedGenerator {
        responses: StdMutex<VecDeque<Result<GenerationOutcome, GenerationError>>>,
        requests: StdMutex<Vec<Vec<Message>>>,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<GenerationOutcome, GenerationError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into()),
                requests: StdMutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            conversation: &[Message],
            _tools: &[ToolDefinition],
        ) -> Result<GenerationOutcome, GenerationError> {
            self.requests.lock().unwrap().push(conversation.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text("fallback draft")))
        }
    }

    fn text(content: &str) -> GenerationOutcome {
        GenerationOutcome::TextOnly {
            content: content.to_string(),
        }
    }

    fn search_call(id: &str) -> GenerationOutcome {
        GenerationOutcome::WithToolCalls {
            content: String::new(),
            calls: vec![ToolCall {
                id: id.to_string(),
                name: "search".to_string(),
                arguments: json!({"query": "AI trends 2025"}),
            }],
        }
    }

    fn publisher_expecting(times: usize) -> Arc<MockPublisher> {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .times(times)
            .returning(|_| PublishOutcome::Published {
                content: "Post created successfully".to_string(),
                status_code: 201,
                post_id: Some("urn:li:share:1".to_string()),
            });
        Arc::new(publisher)
    }

    fn engine(generator: Arc<ScriptedGenerator>, publisher: Arc<MockPublisher>) -> WorkflowEngine {
        WorkflowEngine::new(generator, publisher, Arc::new(InMemorySessionStore::new()))
    }

    fn draft_of(outcome: &RunOutcome) -> &str {
        match outcome {
            RunOutcome::Suspended { payload, .. } => &payload.current_draft,
            other => panic!("expected suspension, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ai_trends_scenario_reaches_done() {
        let generator = ScriptedGenerator::new(vec![
            Ok(text("Draft v1 about AI trends")),
            Ok(text("Draft v2, shorter")),
        ]);
        let engine = engine(generator.clone(), publisher_expecting(1));

        let first = engine
            .start("ai-trends", "write a post about AI trends")
            .await
            .unwrap();
        assert_eq!(draft_of(&first), "Draft v1 about AI trends");

        let second = engine.resume("ai-trends", "make it shorter").await.unwrap();
        assert_eq!(draft_of(&second), "Draft v2, shorter");

        let last = engine.resume("ai-trends", "approve").await.unwrap();
        match last {
            RunOutcome::Completed {
                final_message,
                outcome,
                ..
            } => {
                assert_eq!(final_message, "Post created successfully");
                assert!(outcome.is_published());
            }
            other => panic!("expected completion, got {other:?}"),
        }

        let record = engine.session("ai-trends").await.unwrap().unwrap();
        assert_eq!(record.stage, WorkflowStage::Done);
        assert_eq!(record.state.revision_count, 1);
        let roles: Vec<Role> = record.state.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::Human, Role::Assistant, Role::Assistant, Role::Assistant]
        );

        // the revision request carries the old draft and the feedback
        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        let revision = requests[1].last().unwrap();
        assert_eq!(revision.role, Role::Human);
        assert!(revision.content.contains("Original response: Draft v1 about AI trends"));
        assert!(revision.content.contains("Human feedback: make it shorter"));
        // and is not kept in the conversation
        assert!(!record
            .state
            .messages
            .iter()
            .any(|m| m.content.starts_with("Original response:")));

        let stats = engine.metrics();
        assert_eq!(stats.generations, 2);
        assert_eq!(stats.suspensions, 2);
        assert_eq!(stats.publish_successes, 1);
    }

    #[tokio::test]
    async fn system_instruction_is_inserted_once() {
        let generator = ScriptedGenerator::new(vec![Ok(text("v1")), Ok(text("v2"))]);
        let engine = engine(generator.clone(), publisher_expecting(0));

        engine.start("sys", "hello").await.unwrap();
        engine.resume("sys", "more detail").await.unwrap();

        let record = engine.session("sys").await.unwrap().unwrap();
        let system_count = record
            .state
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(system_count, 1);
        assert_eq!(record.state.messages[0].role, Role::System);
        assert_eq!(generator.requests()[0][0].role, Role::System);
    }

    #[tokio::test]
    async fn tool_calls_run_before_the_next_generation() {
        let generator = ScriptedGenerator::new(vec![Ok(search_call("call_1")), Ok(text("Draft with facts"))]);
        let mut tool = MockTool::new();
        tool.expect_definition().returning(|| ToolDefinition {
            name: "search".to_string(),
            description: "web search".to_string(),
            parameters: json!({"type": "object"}),
        });
        tool.expect_invoke()
            .times(1)
            .returning(|_| Ok("**AI**\nAgents\nURL: https://example.com\n".to_string()));

        let engine = engine(generator.clone(), publisher_expecting(0))
            .with_tools(ToolExecutor::new().with_tool(Arc::new(tool)));

        let outcome = engine.start("tools", "post about AI").await.unwrap();
        assert_eq!(draft_of(&outcome), "Draft with facts");

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        let tool_entry = requests[1].last().unwrap();
        assert_eq!(tool_entry.role, Role::Tool);
        assert_eq!(tool_entry.tool_call_id.as_deref(), Some("call_1"));

        let record = engine.session("tools").await.unwrap().unwrap();
        assert_eq!(record.state.tool_rounds, 0);
        let stages: Vec<&str> = record.transitions.iter().map(|t| t.to.name()).collect();
        assert_eq!(stages, vec!["tool_use", "drafting", "awaiting_feedback"]);
        assert_eq!(engine.metrics().tool_calls, 1);
    }

    #[tokio::test]
    async fn second_resume_after_completion_is_rejected() {
        let generator = ScriptedGenerator::new(vec![Ok(text("Draft"))]);
        let engine = engine(generator, publisher_expecting(1));

        engine.start("once", "hello").await.unwrap();
        engine.resume("once", " YES ").await.unwrap();

        let err = engine.resume("once", "approve").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotSuspended { ref stage, .. } if stage == "done"));
    }

    #[tokio::test]
    async fn protocol_misuse_is_rejected() {
        let generator = ScriptedGenerator::new(vec![Ok(text("Draft"))]);
        let engine = engine(generator, publisher_expecting(0));

        assert!(matches!(
            engine.resume("missing", "approve").await,
            Err(WorkflowError::SessionNotFound { .. })
        ));
        assert!(matches!(
            engine.start("bad id!", "hello").await,
            Err(WorkflowError::InvalidSessionId { .. })
        ));

        engine.start("dup", "hello").await.unwrap();
        assert!(matches!(
            engine.start("dup", "hello again").await,
            Err(WorkflowError::SessionExists { .. })
        ));
        assert!(matches!(
            engine.retry("dup").await,
            Err(WorkflowError::NothingToRetry { .. })
        ));
    }

    #[tokio::test]
    async fn empty_feedback_requests_generic_revision() {
        let generator = ScriptedGenerator::new(vec![Ok(text("v1")), Ok(text("v2"))]);
        let engine = engine(generator.clone(), publisher_expecting(0));

        engine.start("empty", "hello").await.unwrap();
        engine.resume("empty", "   ").await.unwrap();

        let revision = generator.requests()[1].last().unwrap().clone();
        assert!(revision
            .content
            .contains("Human feedback: No feedback provided. Please revise."));
    }

    #[tokio::test]
    async fn revision_limit_abandons_without_publishing() {
        let generator = ScriptedGenerator::new(vec![Ok(text("v1")), Ok(text("v2"))]);
        let engine = engine(generator, publisher_expecting(0)).with_config(WorkflowConfig {
            max_revisions: Some(1),
            ..WorkflowConfig::default()
        });

        engine.start("limit", "hello").await.unwrap();
        engine.resume("limit", "again").await.unwrap();
        let outcome = engine.resume("limit", "and again").await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Abandoned {
                session_id: "limit".to_string(),
                reason: AbandonmentReason::RevisionLimitExceeded { max_revisions: 1 },
            }
        );
        assert!(matches!(
            engine.resume("limit", "approve").await,
            Err(WorkflowError::NotSuspended { .. })
        ));
        assert_eq!(engine.metrics().abandonments, 1);
    }

    #[tokio::test]
    async fn tool_round_limit_abandons() {
        let generator = ScriptedGenerator::new(vec![
            Ok(search_call("a")),
            Ok(search_call("b")),
            Ok(search_call("c")),
        ]);
        let engine = engine(generator, publisher_expecting(0)).with_config(WorkflowConfig {
            max_tool_rounds: Some(2),
            ..WorkflowConfig::default()
        });

        let outcome = engine.start("loop", "hello").await.unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Abandoned {
                reason: AbandonmentReason::ToolRoundLimitExceeded { max_tool_rounds: 2 },
                ..
            }
        ));

        // unknown tool calls still produced error entries
        let record = engine.session("loop").await.unwrap().unwrap();
        assert!(record
            .state
            .messages
            .iter()
            .any(|m| m.role == Role::Tool && m.content == "Error: unknown tool 'search'"));
    }

    #[tokio::test]
    async fn generation_failure_keeps_pre_step_state_and_retry_recovers() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Transport("connection reset".to_string())),
            Ok(text("Recovered draft")),
        ]);
        let engine = engine(generator, publisher_expecting(0));

        let err = engine.start("flaky", "hello").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Generation(_)));

        let record = engine.session("flaky").await.unwrap().unwrap();
        assert_eq!(record.stage, WorkflowStage::Drafting);
        assert_eq!(record.state.messages.len(), 1);
        assert_eq!(record.state.messages[0].role, Role::Human);

        let outcome = engine.retry("flaky").await.unwrap();
        assert_eq!(draft_of(&outcome), "Recovered draft");
        assert_eq!(engine.metrics().generation_failures, 1);
    }

    #[tokio::test]
    async fn session_locks_are_released_after_each_call() {
        let generator = ScriptedGenerator::new(vec![Ok(text("v1")), Ok(text("v2"))]);
        let engine = engine(generator, publisher_expecting(1));

        for i in 0..100 {
            assert!(matches!(
                engine.resume(&format!("missing-{i}"), "approve").await,
                Err(WorkflowError::SessionNotFound { .. })
            ));
        }
        assert_eq!(engine.active_session_locks(), 0);

        engine.start("locks", "hello").await.unwrap();
        let (a, b) = tokio::join!(engine.resume("locks", "shorter"), engine.session("locks"));
        a.unwrap();
        b.unwrap();
        engine.resume("locks", "approve").await.unwrap();
        let _ = engine.retry("locks").await;

        assert_eq!(engine.active_session_locks(), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_on_one_session_leave_no_lock_behind() {
        let generator = ScriptedGenerator::new(vec![Ok(text("v1"))]);
        let engine = engine(generator, publisher_expecting(1));
        engine.start("busy", "hello").await.unwrap();

        let (a, b, c) = tokio::join!(
            engine.resume("busy", "approve"),
            engine.resume("busy", "approve"),
            engine.retry("busy"),
        );
        assert_eq!([a.is_ok(), b.is_ok(), c.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(engine.active_session_locks(), 0);
    }

    #[tokio::test]
    async fn tool_round_during_revision_drops_the_feedback() {
        let generator = ScriptedGenerator::new(vec![
            Ok(text("v1")),
            Ok(search_call("call_1")),
            Ok(text("v2")),
        ]);
        let engine = engine(generator.clone(), publisher_expecting(0));

        engine.start("revise-tools", "hello").await.unwrap();
        let outcome = engine.resume("revise-tools", "add statistics").await.unwrap();
        assert_eq!(draft_of(&outcome), "v2");

        let requests = generator.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1]
            .last()
            .unwrap()
            .content
            .contains("Human feedback: add statistics"));
        assert_eq!(requests[2].last().unwrap().role, Role::Tool);
        assert!(!requests[2]
            .iter()
            .any(|m| m.content.contains("add statistics")));
    }

    #[tokio::test]
    async fn publish_failure_still_terminates() {
        let generator = ScriptedGenerator::new(vec![Ok(text("Draft"))]);
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .times(1)
            .withf(|text| text.to_string() == "Draft")
            .returning(|_| PublishOutcome::Failed {
                error: "{\"message\":\"Invalid access token\"}".to_string(),
                status_code: Some(401),
            });
        let engine = engine(generator, Arc::new(publisher));

        engine.start("fail", "hello").await.unwrap();
        let outcome = engine.resume("fail", "ok").await.unwrap();

        match outcome {
            RunOutcome::Completed { final_message, outcome, .. } => {
                assert_eq!(final_message, "{\"message\":\"Invalid access token\"}");
                assert!(!outcome.is_published());
            }
            other => panic!("expected completion, got {other:?}"),
        }
        let record = engine.session("fail").await.unwrap().unwrap();
        assert_eq!(record.stage, WorkflowStage::Done);
        assert_eq!(engine.metrics().publish_failures, 1);
    }
}
