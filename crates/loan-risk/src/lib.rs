//! Conversational loan default-risk assessment.
//!
//! The `assessment` tree holds the applicant schema, the classifier gateway, the
//! tool-call bridge to the hosted assistant, and the per-session conversation state
//! machine. `config`, `telemetry` and `error` carry the service plumbing shared with
//! the API binary.

pub mod assessment;
pub mod config;
pub mod error;
pub mod telemetry;
