use serde::Serialize;

use super::bridge::BridgeError;
use super::gateway::{GatewayError, PredictionError};
use super::validation::FieldError;

/// User-facing failure taxonomy of an assessment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssessmentError {
    #[error("invalid applicant details: {}", summarize(.0))]
    Validation(Vec<FieldError>),
    #[error("risk model unavailable: {reason}")]
    ModelUnavailable { reason: String },
    #[error("prediction failed: {0}")]
    Prediction(PredictionError),
    #[error("assistant service unavailable: {reason}")]
    ServiceUnavailable { reason: String },
}

impl AssessmentError {
    pub const fn kind(&self) -> &'static str {
        match self {
            AssessmentError::Validation(_) => "validation_error",
            AssessmentError::ModelUnavailable { .. } => "model_unavailable",
            AssessmentError::Prediction(_) => "prediction_error",
            AssessmentError::ServiceUnavailable { .. } => "service_unavailable",
        }
    }

    /// Whether trying again (possibly with corrected input) can succeed. A missing or
    /// corrupt model artifact needs an operator, not a retry.
    pub const fn retryable(&self) -> bool {
        !matches!(self, AssessmentError::ModelUnavailable { .. })
    }

    pub fn view(&self) -> FailureView {
        FailureView {
            kind: self.kind(),
            message: self.to_string(),
            retryable: self.retryable(),
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<GatewayError> for AssessmentError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::ModelUnavailable { reason } => Self::ModelUnavailable { reason },
            GatewayError::Prediction(err) => Self::Prediction(err),
        }
    }
}

impl From<BridgeError> for AssessmentError {
    fn from(value: BridgeError) -> Self {
        match value {
            BridgeError::ServiceUnavailable { reason } => Self::ServiceUnavailable { reason },
        }
    }
}

/// Serializable failure summary for API payloads and turn reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureView {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}
