//! Loan default-risk assessment: the applicant schema and its validator, the
//! classifier gateway, the tool-call bridge to the hosted assistant and the
//! conversation state machine that ties them together.

pub mod batch;
pub mod bridge;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use batch::{score_csv, score_csv_path, BatchError, BatchReport, BatchRow, RowOutcome};
pub use bridge::{
    BridgeResult, ChatCompletion, ChatCompletionClient, OpenAiCompatibleClient, ServiceError,
    ToolCallBridge,
};
pub use conversation::{AssessmentPhase, ConversationEngine, ConversationState, TurnReport};
pub use domain::{
    ApplicantRecord, ChatMessage, ChatRole, Decision, DecisionLabel, FieldName, LabelFraming,
    PartialRecord,
};
pub use error::{AssessmentError, FailureView};
pub use gateway::{ClassifierGateway, GatewayError, ModelLoadError, PredictionError};
pub use repository::{
    RepositoryError, SessionHandle, SessionId, SessionRecord, SessionRepository, SessionView,
};
pub use router::assessment_router;
pub use service::{AssessmentService, AssessmentServiceError};
pub use validation::{validate, validate_field, FieldError, FieldProblem, SchemaPolicy};
