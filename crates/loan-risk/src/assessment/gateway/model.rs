use std::fmt::Debug;
use std::sync::Arc;

use crate::assessment::domain::{ApplicantRecord, FieldName};

/// Opaque pre-trained binary classifier.
pub trait RiskModel: Debug + Send + Sync {
    /// Returns the raw class, `0` or `1`, for one applicant row.
    fn predict(&self, record: &ApplicantRecord) -> Result<u8, PredictionError>;
}

/// Produces the model once; the gateway decides when that happens.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn RiskModel>, ModelLoadError>;

    /// Short description of the artifact source for logs.
    fn describe(&self) -> String;
}

/// Artifact could not be turned into a usable model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {path}")]
    NotFound { path: String },
    #[error("unable to read model artifact {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("model artifact {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

/// The loaded model rejected a row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    #[error("model has no weight for {field} value '{value}'")]
    UnseenCategory { field: FieldName, value: String },
    #[error("model does not cover feature {field}")]
    MissingFeature { field: FieldName },
    #[error("model produced a non-finite score")]
    NonFinite,
    #[error("model returned unexpected class {0}")]
    UnexpectedClass(u8),
}
