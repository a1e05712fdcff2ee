use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::model::{ModelLoadError, ModelLoader, PredictionError, RiskModel};
use crate::assessment::domain::{ApplicantRecord, FieldName};

const ARTIFACT_FORMAT: &str = "loan-risk-scorecard";
const SUPPORTED_VERSION: u32 = 1;

/// Logistic scorecard exported from the training notebook.
///
/// Continuous inputs are standardised with the stored mean and scale; categorical
/// inputs contribute a per-code weight. The class is `1` when the logistic score
/// reaches `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardModel {
    pub format: String,
    pub version: u32,
    pub intercept: f64,
    pub threshold: f64,
    pub numeric: BTreeMap<FieldName, NumericTerm>,
    pub categorical: BTreeMap<FieldName, BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericTerm {
    pub mean: f64,
    pub scale: f64,
    pub weight: f64,
}

impl ScorecardModel {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let model: Self = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), String> {
        if self.format != ARTIFACT_FORMAT {
            return Err(format!(
                "expected format '{ARTIFACT_FORMAT}', found '{}'",
                self.format
            ));
        }
        if self.version != SUPPORTED_VERSION {
            return Err(format!("unsupported artifact version {}", self.version));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(format!("threshold {} outside (0, 1)", self.threshold));
        }
        if !self.intercept.is_finite() {
            return Err("intercept is not finite".to_string());
        }
        for (field, term) in &self.numeric {
            if !(term.scale.is_finite() && term.scale > 0.0) {
                return Err(format!("scale for {field} must be positive"));
            }
            if !(term.mean.is_finite() && term.weight.is_finite()) {
                return Err(format!("term for {field} is not finite"));
            }
        }
        Ok(())
    }

    /// Probability of the positive class for one row.
    pub fn score(&self, record: &ApplicantRecord) -> Result<f64, PredictionError> {
        let mut logit = self.intercept;

        for (field, value) in record.numeric_features() {
            let term = self
                .numeric
                .get(&field)
                .ok_or(PredictionError::MissingFeature { field })?;
            logit += term.weight * (value - term.mean) / term.scale;
        }

        for (field, code) in record.categorical_features() {
            let table = self
                .categorical
                .get(&field)
                .ok_or(PredictionError::MissingFeature { field })?;
            let weight = table
                .get(code)
                .ok_or_else(|| PredictionError::UnseenCategory {
                    field,
                    value: code.to_string(),
                })?;
            logit += weight;
        }

        let probability = 1.0 / (1.0 + (-logit).exp());
        if probability.is_finite() {
            Ok(probability)
        } else {
            Err(PredictionError::NonFinite)
        }
    }
}

impl RiskModel for ScorecardModel {
    fn predict(&self, record: &ApplicantRecord) -> Result<u8, PredictionError> {
        let probability = self.score(record)?;
        Ok(u8::from(probability >= self.threshold))
    }
}

/// Reads a scorecard artifact from disk.
#[derive(Debug, Clone)]
pub struct FileModelLoader {
    path: PathBuf,
}

impl FileModelLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelLoader for FileModelLoader {
    fn load(&self) -> Result<Arc<dyn RiskModel>, ModelLoadError> {
        let path = self.path.display().to_string();
        let raw = fs::read_to_string(&self.path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ModelLoadError::NotFound { path: path.clone() },
            _ => ModelLoadError::Unreadable {
                path: path.clone(),
                reason: err.to_string(),
            },
        })?;

        let model = ScorecardModel::from_json(&raw)
            .map_err(|reason| ModelLoadError::Corrupt { path, reason })?;
        Ok(Arc::new(model))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
