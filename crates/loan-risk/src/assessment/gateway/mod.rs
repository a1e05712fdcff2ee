//! Single entry point to the pre-trained classifier.
//!
//! The artifact is loaded at most once per gateway. `initialize` runs the load eagerly
//! at process start; `decide` uses the same once-guarded slot, so concurrent first
//! callers block on one load and then share its result. A failed load is cached as
//! well: a broken artifact is reported on every call without being re-read.

mod model;
mod scorecard;

pub use model::{ModelLoadError, ModelLoader, PredictionError, RiskModel};
pub use scorecard::{FileModelLoader, NumericTerm, ScorecardModel};

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{debug, error, info};

use super::domain::{ApplicantRecord, Decision, LabelFraming, ModelClass};

type LoadedModel = Result<Arc<dyn RiskModel>, ModelLoadError>;

pub struct ClassifierGateway {
    loader: Box<dyn ModelLoader>,
    model: OnceLock<LoadedModel>,
    framing: LabelFraming,
}

impl ClassifierGateway {
    pub fn new(loader: impl ModelLoader + 'static, framing: LabelFraming) -> Self {
        Self {
            loader: Box::new(loader),
            model: OnceLock::new(),
            framing,
        }
    }

    pub fn from_path(path: impl Into<PathBuf>, framing: LabelFraming) -> Self {
        Self::new(FileModelLoader::new(path), framing)
    }

    /// Gateway around an already constructed model; nothing is loaded lazily.
    pub fn with_model(model: Arc<dyn RiskModel>, framing: LabelFraming) -> Self {
        let gateway = Self::new(PreloadedModel(model.clone()), framing);
        let _ = gateway.model.set(Ok(model));
        gateway
    }

    pub fn framing(&self) -> LabelFraming {
        self.framing
    }

    /// Loads the artifact now if no load has happened yet.
    pub fn initialize(&self) -> Result<(), GatewayError> {
        self.model().map(|_| ())
    }

    /// `Some(true)` once a load succeeded, `Some(false)` once it failed, `None` before
    /// any load was attempted.
    pub fn availability(&self) -> Option<bool> {
        self.model.get().map(Result::is_ok)
    }

    pub fn decide(&self, record: &ApplicantRecord) -> Result<Decision, GatewayError> {
        let model = self.model()?;
        let class = match model.predict(record)? {
            0 => ModelClass::Negative,
            1 => ModelClass::Positive,
            other => return Err(PredictionError::UnexpectedClass(other).into()),
        };
        let label = self.framing.label_for(class);
        debug!(%label, "classifier decision");

        Ok(Decision {
            label,
            source_record: record.clone(),
        })
    }

    fn model(&self) -> Result<&Arc<dyn RiskModel>, GatewayError> {
        self.model
            .get_or_init(|| {
                let source = self.loader.describe();
                let loaded = self.loader.load();
                match &loaded {
                    Ok(_) => info!(%source, "risk model loaded"),
                    Err(err) => error!(%source, error = %err, "risk model failed to load"),
                }
                loaded
            })
            .as_ref()
            .map_err(|err| GatewayError::ModelUnavailable {
                reason: err.to_string(),
            })
    }
}

impl std::fmt::Debug for ClassifierGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierGateway")
            .field("source", &self.loader.describe())
            .field("framing", &self.framing)
            .field("availability", &self.availability())
            .finish()
    }
}

struct PreloadedModel(Arc<dyn RiskModel>);

impl ModelLoader for PreloadedModel {
    fn load(&self) -> Result<Arc<dyn RiskModel>, ModelLoadError> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "in-memory model".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("risk model unavailable: {reason}")]
    ModelUnavailable { reason: String },
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}
