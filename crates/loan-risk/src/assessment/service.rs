use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::bridge::ChatCompletionClient;
use super::conversation::{ConversationEngine, Turn, TurnFailure, TurnReport};
use super::domain::Decision;
use super::error::AssessmentError;
use super::gateway::ClassifierGateway;
use super::repository::{
    RepositoryError, SessionId, SessionRecord, SessionRepository, SessionView,
};
use super::validation::{self, SchemaPolicy};

/// Service composing the session store, conversation engine and classifier gateway.
pub struct AssessmentService<R, C: ?Sized> {
    repository: Arc<R>,
    engine: ConversationEngine<C>,
    gateway: Arc<ClassifierGateway>,
    policy: SchemaPolicy,
}

impl<R, C> AssessmentService<R, C>
where
    R: SessionRepository + 'static,
    C: ChatCompletionClient + ?Sized + 'static,
{
    pub fn new(
        repository: Arc<R>,
        client: Arc<C>,
        gateway: Arc<ClassifierGateway>,
        policy: SchemaPolicy,
        timeout: Duration,
    ) -> Self {
        let engine = ConversationEngine::new(client, gateway.clone(), policy, timeout);
        Self {
            repository,
            engine,
            gateway,
            policy,
        }
    }

    pub fn gateway(&self) -> &Arc<ClassifierGateway> {
        &self.gateway
    }

    pub fn policy(&self) -> &SchemaPolicy {
        &self.policy
    }

    /// Open a session in its opening state.
    pub async fn start_session(&self) -> Result<SessionView, AssessmentServiceError> {
        let record = SessionRecord::new(SessionId::generate(), Utc::now());
        let handle = self.repository.insert(record)?;
        let session = handle.lock().await;
        info!(session_id = %session.id, "assessment session started");
        Ok(session.view())
    }

    pub async fn get(&self, id: &SessionId) -> Result<SessionView, AssessmentServiceError> {
        let handle = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        let session = handle.lock().await;
        Ok(session.view())
    }

    /// Process one user message. Messages for the same session are serialised on the
    /// session lock; on `ServiceUnavailable` the stored state is left as it was.
    pub async fn send_message(
        &self,
        id: &SessionId,
        message: &str,
    ) -> Result<TurnReport, AssessmentServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssessmentServiceError::EmptyMessage);
        }

        let handle = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        let mut session = handle.lock().await;

        // Work on a copy so a dropped request cannot leave the session half-updated.
        let state = session.state.clone();
        match self.engine.process_turn(state, message).await {
            Ok(Turn { state, report }) => {
                session.state = state;
                session.updated_at = Utc::now();
                Ok(report)
            }
            Err(TurnFailure { state, error }) => {
                warn!(session_id = %session.id, error = %error, "turn not processed");
                session.state = state;
                Err(error.into())
            }
        }
    }

    /// Back to the opening state. Resetting a fresh session changes nothing.
    pub async fn reset(&self, id: &SessionId) -> Result<SessionView, AssessmentServiceError> {
        let handle = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        let mut session = handle.lock().await;
        if !session.state.is_fresh() {
            session.state.reset();
            session.updated_at = Utc::now();
            info!(session_id = %session.id, "assessment session reset");
        }
        Ok(session.view())
    }

    pub async fn end_session(&self, id: &SessionId) -> Result<(), AssessmentServiceError> {
        if self.repository.remove(id)? {
            info!(session_id = %id, "assessment session ended");
            Ok(())
        } else {
            Err(RepositoryError::NotFound.into())
        }
    }

    /// Form path: validate a complete field mapping and decide, without a session.
    pub fn score(&self, raw: &Map<String, Value>) -> Result<Decision, AssessmentError> {
        let record =
            validation::validate(raw, &self.policy).map_err(AssessmentError::Validation)?;
        Ok(self.gateway.decide(&record)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("message must not be empty")]
    EmptyMessage,
}
