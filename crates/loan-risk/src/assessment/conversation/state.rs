use std::fmt;

use serde::{Deserialize, Serialize};

use super::render;
use crate::assessment::domain::{ChatMessage, ChatRole, Decision, PartialRecord};

/// Where a session stands in the assessment dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentPhase {
    AwaitingConsent,
    Collecting,
    ReadyToDecide,
    Decided,
}

impl AssessmentPhase {
    pub const fn label(self) -> &'static str {
        match self {
            AssessmentPhase::AwaitingConsent => "AWAITING_CONSENT",
            AssessmentPhase::Collecting => "COLLECTING",
            AssessmentPhase::ReadyToDecide => "READY_TO_DECIDE",
            AssessmentPhase::Decided => "DECIDED",
        }
    }
}

impl fmt::Display for AssessmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTransition {
    pub from: AssessmentPhase,
    pub to: AssessmentPhase,
}

/// One session's dialogue: phase, ordered history, fields gathered so far and the
/// decisions produced. The engine takes it by value and hands back the next state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    phase: AssessmentPhase,
    history: Vec<ChatMessage>,
    partial: PartialRecord,
    decisions: Vec<Decision>,
}

impl ConversationState {
    /// Opening state: the system prompt and the welcome message, nothing collected.
    pub fn new() -> Self {
        Self {
            phase: AssessmentPhase::AwaitingConsent,
            history: opening_messages(),
            partial: PartialRecord::default(),
            decisions: Vec::new(),
        }
    }

    /// Discards history, partial record and decisions. Resetting an already fresh
    /// state leaves it as it was.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_fresh(&self) -> bool {
        *self == Self::new()
    }

    pub fn phase(&self) -> AssessmentPhase {
        self.phase
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// History without system messages, as shown to a user.
    pub fn transcript(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history
            .iter()
            .filter(|message| message.role != ChatRole::System)
    }

    pub fn partial(&self) -> &PartialRecord {
        &self.partial
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.decisions.last()
    }

    pub(crate) fn transition(&mut self, to: AssessmentPhase) -> Option<PhaseTransition> {
        let from = self.phase;
        if from == to {
            return None;
        }
        self.phase = to;
        Some(PhaseTransition { from, to })
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    pub(crate) fn partial_mut(&mut self) -> &mut PartialRecord {
        &mut self.partial
    }

    pub(crate) fn record_decision(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

fn opening_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(render::SYSTEM_PROMPT),
        ChatMessage::assistant(render::WELCOME),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::domain::FieldName;
    use serde_json::json;

    #[test]
    fn new_state_holds_opening_pair() {
        let state = ConversationState::new();
        assert_eq!(state.phase(), AssessmentPhase::AwaitingConsent);
        assert_eq!(state.history().len(), 2);
        assert_eq!(state.history()[0].role, ChatRole::System);
        assert_eq!(state.history()[1].role, ChatRole::Assistant);
        assert_eq!(state.transcript().count(), 1);
        assert!(state.partial().is_empty());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut state = ConversationState::new();
        state.transition(AssessmentPhase::Collecting);
        state.push(ChatMessage::user("yes"));
        state.partial_mut().merge(FieldName::Age, json!(40));

        state.reset();
        let once = state.clone();
        state.reset();

        assert_eq!(state, once);
        assert!(state.is_fresh());
    }

    #[test]
    fn transition_to_same_phase_is_not_reported() {
        let mut state = ConversationState::new();
        assert_eq!(state.transition(AssessmentPhase::AwaitingConsent), None);
        assert_eq!(
            state.transition(AssessmentPhase::Collecting),
            Some(PhaseTransition {
                from: AssessmentPhase::AwaitingConsent,
                to: AssessmentPhase::Collecting,
            })
        );
    }
}
