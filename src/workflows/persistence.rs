use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::state::{SessionState, WorkflowStage};
use crate::config::PersistenceConfig;
use crate::publish::PublishOutcome;

pub const RECORD_VERSION: &str = "1";
const MAX_SESSION_ID_LEN: usize = 128;

/// Errors that can occur during session persistence operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("State corruption detected for session {session_id}: {reason}")]
    StateCorruption { session_id: String, reason: String },

    #[error("Invalid session id {session_id:?}: use 1-128 characters from [A-Za-z0-9_-]")]
    InvalidSessionId { session_id: String },
}

/// Why a record was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointReason {
    SessionCreated,
    StageTransition,
    BeforeSuspend,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub checkpoint_id: String,
    pub reason: CheckpointReason,
    pub integrity_hash: String,
    pub pid: Option<u32>,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransitionRecord {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Everything persisted for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: String,
    pub session_id: String,
    pub stage: WorkflowStage,
    pub state: SessionState,
    #[serde(default)]
    pub publish_outcome: Option<PublishOutcome>,
    /// Set and saved before the publisher is called
    #[serde(default)]
    pub publish_attempted: bool,
    #[serde(default)]
    pub transitions: Vec<StageTransitionRecord>,
    pub checkpoint: Option<CheckpointMetadata>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            version: RECORD_VERSION.to_string(),
            session_id: session_id.into(),
            stage: WorkflowStage::Drafting,
            state,
            publish_outcome: None,
            publish_attempted: false,
            transitions: Vec::new(),
            checkpoint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to` and append the transition to the audit trail
    pub fn transition_to(&mut self, to: WorkflowStage, duration_ms: u64) {
        info!(
            session_id = %self.session_id,
            from = %self.stage,
            to = %to,
            duration_ms = duration_ms,
            "Workflow stage transition"
        );
        self.transitions.push(StageTransitionRecord {
            from: self.stage.clone(),
            to: to.clone(),
            timestamp: Utc::now(),
            duration_ms,
        });
        self.stage = to;
    }
}

/// Reject ids that are empty, too long or unsafe as file names
pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidSessionId {
            session_id: session_id.to_string(),
        })
    }
}

/// Fields covered by the integrity hash, in a fixed order
#[derive(Serialize)]
struct IntegrityFields<'a> {
    session_id: &'a str,
    version: &'a str,
    stage: &'a WorkflowStage,
    state: &'a SessionState,
    publish_outcome: &'a Option<PublishOutcome>,
    publish_attempted: bool,
    created_at: &'a DateTime<Utc>,
}

/// SHA-256 over the compact JSON of the fields that must not change behind
/// the engine's back. Bookkeeping (checkpoint, transitions, `updated_at`) is
/// left out.
pub fn calculate_integrity_hash(record: &SessionRecord) -> Result<String, StoreError> {
    let canonical = serde_json::to_vec(&IntegrityFields {
        session_id: &record.session_id,
        version: &record.version,
        stage: &record.stage,
        state: &record.state,
        publish_outcome: &record.publish_outcome,
        publish_attempted: record.publish_attempted,
        created_at: &record.created_at,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy of `record` ready to be written: pruned history and fresh checkpoint metadata
fn prepare_for_save(
    record: &SessionRecord,
    reason: CheckpointReason,
    config: &PersistenceConfig,
) -> Result<SessionRecord, StoreError> {
    let mut to_save = record.clone();
    to_save.updated_at = Utc::now();

    if to_save.transitions.len() > config.max_transition_history {
        let excess = to_save.transitions.len() - config.max_transition_history;
        to_save.transitions.drain(0..excess);
        debug!(
            session_id = %to_save.session_id,
            pruned = excess,
            "Pruned excess transition history entries"
        );
    }

    let integrity_hash = if config.enable_integrity_checks {
        calculate_integrity_hash(&to_save)?
    } else {
        "integrity_disabled".to_string()
    };

    to_save.checkpoint = Some(CheckpointMetadata {
        checkpoint_id: format!("{}_{}", Utc::now().timestamp(), rand::rng().random::<u32>()),
        reason,
        integrity_hash,
        pid: Some(std::process::id()),
        hostname: hostname::get()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
    });

    Ok(to_save)
}

fn verify_integrity(record: &SessionRecord, config: &PersistenceConfig) -> Result<(), StoreError> {
    if !config.enable_integrity_checks {
        return Ok(());
    }

    let expected = record
        .checkpoint
        .as_ref()
        .map(|checkpoint| checkpoint.integrity_hash.as_str())
        .unwrap_or_default();
    let actual = calculate_integrity_hash(record)?;

    if expected != actual {
        warn!(
            session_id = %record.session_id,
            expected_hash = %expected,
            actual_hash = %actual,
            "Session integrity check failed"
        );
        return Err(StoreError::StateCorruption {
            session_id: record.session_id.clone(),
            reason: "Integrity check failed".to_string(),
        });
    }

    Ok(())
}

/// Keyed, last-write-wins storage of session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Save the record, returning the checkpoint id written
    async fn put(&self, record: &SessionRecord, reason: CheckpointReason) -> Result<String, StoreError>;
}

/// One pretty-printed JSON file per session
#[derive(Debug, Clone)]
pub struct FileSystemSessionStore {
    config: PersistenceConfig,
}

impl FileSystemSessionStore {
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config }
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.config
            .state_directory
            .join(format!("{session_id}.session.json"))
    }

    /// Ids of every stored session, sorted
    pub async fn list_session_ids(&self) -> Result<Vec<String>, StoreError> {
        if !self.config.state_directory.exists() {
            return Ok(vec![]);
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.config.state_directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".session.json"))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl SessionStore for FileSystemSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        validate_session_id(session_id)?;
        let path = self.session_file_path(session_id);

        if !path.exists() {
            debug!(session_id = %session_id, file = ?path, "No session file found");
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).await?;
        let record: SessionRecord = serde_json::from_str(&contents)?;
        verify_integrity(&record, &self.config)?;

        debug!(
            session_id = %session_id,
            stage = %record.stage,
            "Session loaded"
        );
        Ok(Some(record))
    }

    async fn put(&self, record: &SessionRecord, reason: CheckpointReason) -> Result<String, StoreError> {
        validate_session_id(&record.session_id)?;
        fs::create_dir_all(&self.config.state_directory).await?;

        let to_save = prepare_for_save(record, reason, &self.config)?;
        let path = self.session_file_path(&record.session_id);
        let serialized = serde_json::to_string_pretty(&to_save)?;

        // Write to temporary file first, then rename (atomic operation)
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, serialized).await?;
        fs::rename(&temp_path, &path).await?;

        let checkpoint_id = to_save
            .checkpoint
            .map(|checkpoint| checkpoint.checkpoint_id)
            .unwrap_or_default();

        debug!(
            session_id = %record.session_id,
            checkpoint_id = %checkpoint_id,
            reason = ?reason,
            file = ?path,
            "Session saved"
        );
        Ok(checkpoint_id)
    }
}

/// Process-local store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    config: PersistenceConfig,
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        validate_session_id(session_id)?;
        Ok(self.records.read().await.get(session_id).cloned())
    }

    async fn put(&self, record: &SessionRecord, reason: CheckpointReason) -> Result<String, StoreError> {
        validate_session_id(&record.session_id)?;
        let to_save = prepare_for_save(record, reason, &self.config)?;
        let checkpoint_id = to_save
            .checkpoint
            .as_ref()
            .map(|checkpoint| checkpoint.checkpoint_id.clone())
            .unwrap_or_default();
        self.records
            .write()
            .await
            .insert(record.session_id.clone(), to_save);
        Ok(checkpoint_id)
    }
}
