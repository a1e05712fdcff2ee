//! Turn-taking state machine for the chat assessment.
//!
//! A session moves `AWAITING_CONSENT -> COLLECTING -> READY_TO_DECIDE -> DECIDED`.
//! Consent and "start another assessment" are recognised locally; every other turn
//! goes through the tool-call bridge. Fields from a tool call are checked one by one
//! and merged (last write wins); the gateway runs as soon as all ten are present.
//! A failed decision returns to `COLLECTING` with the gathered fields intact.

mod engine;
pub mod intent;
pub mod render;
mod state;

pub use engine::{ConversationEngine, Turn, TurnFailure, TurnReport};
pub use intent::Intent;
pub use state::{AssessmentPhase, ConversationState, PhaseTransition};
