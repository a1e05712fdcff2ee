use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::intent::{self, Intent};
use super::render;
use super::state::{AssessmentPhase, ConversationState, PhaseTransition};
use crate::assessment::bridge::{
    BridgeResult, CandidateFields, ChatCompletionClient, ToolCallBridge,
};
use crate::assessment::domain::{ChatMessage, Decision, FieldName};
use crate::assessment::error::{AssessmentError, FailureView};
use crate::assessment::gateway::ClassifierGateway;
use crate::assessment::validation::{self, FieldError, SchemaPolicy};

/// What one accepted user turn did to the session.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub reply: String,
    pub phase: AssessmentPhase,
    pub transitions: Vec<PhaseTransition>,
    pub recorded: Vec<FieldName>,
    pub rejected: Vec<FieldError>,
    pub missing: Vec<FieldName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureView>,
}

/// An accepted turn: the next state plus its report.
#[derive(Debug, Clone)]
pub struct Turn {
    pub state: ConversationState,
    pub report: TurnReport,
}

/// A turn that could not be processed. `state` is the state passed in, untouched, so
/// the same message can be sent again.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct TurnFailure {
    pub state: ConversationState,
    pub error: AssessmentError,
}

/// Drives one turn at a time through consent, slot filling and the decision.
pub struct ConversationEngine<C: ?Sized> {
    bridge: ToolCallBridge<C>,
    gateway: Arc<ClassifierGateway>,
    policy: SchemaPolicy,
}

impl<C> ConversationEngine<C>
where
    C: ChatCompletionClient + ?Sized + 'static,
{
    pub fn new(
        client: Arc<C>,
        gateway: Arc<ClassifierGateway>,
        policy: SchemaPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            bridge: ToolCallBridge::new(client, &policy, timeout),
            gateway,
            policy,
        }
    }

    pub fn policy(&self) -> &SchemaPolicy {
        &self.policy
    }

    pub async fn process_turn(
        &self,
        state: ConversationState,
        input: &str,
    ) -> Result<Turn, TurnFailure> {
        let mut next = state.clone();
        let mut turn = TurnBuilder::default();
        next.push(ChatMessage::user(input));

        match next.phase() {
            AssessmentPhase::AwaitingConsent => match intent::classify(input) {
                Intent::Affirm | Intent::NewAssessment => {
                    turn.move_to(&mut next, AssessmentPhase::Collecting);
                    let result = self.forward(&next, state).await?;
                    self.collect(&mut next, &mut turn, result);
                }
                Intent::Decline => turn.reply(&mut next, render::DECLINED.to_string()),
                Intent::Other => turn.reply(&mut next, render::CONSENT_REMINDER.to_string()),
            },
            AssessmentPhase::Collecting | AssessmentPhase::ReadyToDecide => {
                let result = self.forward(&next, state).await?;
                self.collect(&mut next, &mut turn, result);
            }
            // Only an explicit request reopens collection; a plain "ok" or "yes" after
            // a result is a follow-up about it.
            AssessmentPhase::Decided => match intent::classify(input) {
                Intent::NewAssessment => {
                    next.partial_mut().clear();
                    turn.move_to(&mut next, AssessmentPhase::Collecting);
                    let result = self.forward(&next, state).await?;
                    self.collect(&mut next, &mut turn, result);
                }
                Intent::Affirm | Intent::Decline | Intent::Other => {
                    let result = self.forward(&next, state).await?;
                    match result {
                        BridgeResult::Clarify(text) => turn.reply(&mut next, text),
                        BridgeResult::Decide(_) => {
                            // The assessment is closed; a repeated tool call must not
                            // produce a second decision for the same record.
                            let message = next
                                .last_decision()
                                .map(render::already_decided_message)
                                .unwrap_or_else(|| render::CONSENT_REMINDER.to_string());
                            turn.reply(&mut next, message);
                        }
                    }
                }
            },
        }

        Ok(turn.finish(next))
    }

    /// Sends the history to the assistant. On failure the caller's prior state is
    /// handed back so the failed user turn never lands in history.
    async fn forward(
        &self,
        next: &ConversationState,
        prior: ConversationState,
    ) -> Result<BridgeResult, TurnFailure> {
        self.bridge
            .turn(next.history())
            .await
            .map_err(|err| TurnFailure {
                state: prior,
                error: err.into(),
            })
    }

    fn collect(&self, state: &mut ConversationState, turn: &mut TurnBuilder, result: BridgeResult) {
        match result {
            BridgeResult::Clarify(text) => turn.reply(state, text),
            BridgeResult::Decide(candidates) => {
                self.merge(state, turn, candidates);
                if state.partial().is_complete() {
                    turn.move_to(state, AssessmentPhase::ReadyToDecide);
                    self.decide(state, turn);
                } else {
                    let message = render::collection_message(
                        &turn.recorded,
                        &turn.rejected,
                        &state.partial().missing(),
                    );
                    turn.reply(state, message);
                }
            }
        }
    }

    fn merge(
        &self,
        state: &mut ConversationState,
        turn: &mut TurnBuilder,
        candidates: CandidateFields,
    ) {
        for (field, value) in candidates {
            match validation::validate_field(field, &value, &self.policy) {
                Ok(normalized) => {
                    state.partial_mut().merge(field, normalized);
                    turn.recorded.push(field);
                }
                Err(problem) => {
                    debug!(%field, %problem, "candidate field rejected");
                    turn.rejected.push(FieldError { field, problem });
                }
            }
        }
    }

    fn decide(&self, state: &mut ConversationState, turn: &mut TurnBuilder) {
        let outcome = validation::validate(&state.partial().to_raw(), &self.policy)
            .map_err(AssessmentError::Validation)
            .and_then(|record| self.gateway.decide(&record).map_err(AssessmentError::from));

        match outcome {
            Ok(decision) => {
                info!(label = %decision.label, "assessment decided");
                turn.move_to(state, AssessmentPhase::Decided);
                turn.reply(state, render::decision_message(&decision));
                state.record_decision(decision.clone());
                turn.decision = Some(decision);
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, "assessment could not be decided");
                if let AssessmentError::Validation(errors) = &err {
                    // Only the offending fields are asked for again.
                    for error in errors {
                        state.partial_mut().remove(error.field);
                    }
                }
                turn.move_to(state, AssessmentPhase::Collecting);
                turn.reply(state, render::failure_message(&err));
                turn.failure = Some(err.view());
            }
        }
    }
}

#[derive(Debug, Default)]
struct TurnBuilder {
    replies: Vec<String>,
    transitions: Vec<PhaseTransition>,
    recorded: Vec<FieldName>,
    rejected: Vec<FieldError>,
    decision: Option<Decision>,
    failure: Option<FailureView>,
}

impl TurnBuilder {
    fn move_to(&mut self, state: &mut ConversationState, phase: AssessmentPhase) {
        if let Some(transition) = state.transition(phase) {
            debug!(from = %transition.from, to = %transition.to, "phase transition");
            self.transitions.push(transition);
        }
    }

    fn reply(&mut self, state: &mut ConversationState, text: String) {
        state.push(ChatMessage::assistant(text.clone()));
        self.replies.push(text);
    }

    fn finish(self, state: ConversationState) -> Turn {
        let report = TurnReport {
            reply: self.replies.join("\n\n"),
            phase: state.phase(),
            transitions: self.transitions,
            recorded: self.recorded,
            rejected: self.rejected,
            missing: state.partial().missing(),
            decision: self.decision,
            failure: self.failure,
        };
        Turn { state, report }
    }
}
