use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use super::conversation::{AssessmentPhase, ConversationState};
use super::domain::{ChatMessage, Decision, FieldName};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(format!("sess-{}", uuid::Uuid::new_v4().simple()))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation state plus bookkeeping for one session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: ConversationState,
}

impl SessionRecord {
    pub fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            state: ConversationState::new(),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            phase: self.state.phase(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            messages: self.state.transcript().cloned().collect(),
            collected: self.state.partial().collected().clone(),
            missing: self.state.partial().missing(),
            last_decision: self.state.last_decision().cloned(),
        }
    }
}

/// Per-session lock. Turns for one session queue on it; sessions never share one.
pub type SessionHandle = Arc<Mutex<SessionRecord>>;

/// Storage abstraction so the service module can be exercised in isolation.
pub trait SessionRepository: Send + Sync {
    fn insert(&self, record: SessionRecord) -> Result<SessionHandle, RepositoryError>;
    fn fetch(&self, id: &SessionId) -> Result<Option<SessionHandle>, RepositoryError>;
    /// Returns whether a session was removed.
    fn remove(&self, id: &SessionId) -> Result<bool, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("session already exists")]
    Conflict,
    #[error("session not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Session as exposed over the API: no system prompt, no internal bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub phase: AssessmentPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub collected: BTreeMap<FieldName, Value>,
    pub missing: Vec<FieldName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<Decision>,
}
