// Session workflow: state, review gate, persistence and the engine driving them

pub mod engine;
pub mod feedback;
pub mod persistence;
pub mod state;

pub use engine::{RunOutcome, WorkflowEngine, WorkflowError, PUBLISH_OUTCOME_UNKNOWN};
pub use feedback::{FeedbackDecision, SuspendPayload};
pub use persistence::{
    CheckpointReason, FileSystemSessionStore, InMemorySessionStore, SessionRecord, SessionStore,
    StoreError,
};
pub use state::{AbandonmentReason, Message, Role, SessionState, WorkflowStage};
