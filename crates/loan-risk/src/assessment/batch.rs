use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use super::domain::{DecisionLabel, FieldName};
use super::gateway::{ClassifierGateway, GatewayError};
use super::validation::{self, FieldError, SchemaPolicy};

#[derive(Debug)]
pub enum BatchError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumns(Vec<FieldName>),
    Gateway(GatewayError),
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::Io(err) => write!(f, "failed to read applicant file: {}", err),
            BatchError::Csv(err) => write!(f, "invalid applicant CSV data: {}", err),
            BatchError::MissingColumns(fields) => {
                let names: Vec<&str> = fields.iter().map(|field| field.as_str()).collect();
                write!(f, "applicant CSV is missing columns: {}", names.join(", "))
            }
            BatchError::Gateway(err) => write!(f, "cannot score applicants: {}", err),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Io(err) => Some(err),
            BatchError::Csv(err) => Some(err),
            BatchError::MissingColumns(_) => None,
            BatchError::Gateway(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for BatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for BatchError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<GatewayError> for BatchError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

/// Result for one data row; `line` is the 1-based line in the file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub line: u64,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Decided { label: DecisionLabel },
    Rejected { errors: Vec<FieldError> },
    Failed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub decided: usize,
    pub rejected: usize,
    pub failed: usize,
    pub labels: BTreeMap<DecisionLabel, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub rows: Vec<BatchRow>,
    pub summary: BatchSummary,
}

pub fn score_csv_path(
    path: impl AsRef<Path>,
    gateway: &ClassifierGateway,
    policy: &SchemaPolicy,
) -> Result<BatchReport, BatchError> {
    let file = File::open(path)?;
    score_csv(file, gateway, policy)
}

/// Scores every row of a CSV export. Headers may use wire names or the credit-risk
/// dataset names; extra columns are ignored and empty cells count as missing.
pub fn score_csv<R: Read>(
    reader: R,
    gateway: &ClassifierGateway,
    policy: &SchemaPolicy,
) -> Result<BatchReport, BatchError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<Option<FieldName>> = csv_reader
        .headers()?
        .iter()
        .map(FieldName::from_column)
        .collect();
    let missing: Vec<FieldName> = FieldName::ALL
        .into_iter()
        .filter(|field| !columns.contains(&Some(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(BatchError::MissingColumns(missing));
    }

    // A broken artifact fails every row the same way; stop before reading them.
    gateway.initialize()?;

    let mut rows = Vec::new();
    let mut summary = BatchSummary::default();

    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|position| position.line())
            .unwrap_or(index as u64 + 2);

        let mut raw = Map::new();
        for (column, cell) in columns.iter().zip(record.iter()) {
            if let Some(field) = column {
                if !cell.is_empty() {
                    raw.insert(field.as_str().to_string(), Value::String(cell.to_string()));
                }
            }
        }

        let outcome = match validation::validate(&raw, policy) {
            Err(errors) => RowOutcome::Rejected { errors },
            Ok(applicant) => match gateway.decide(&applicant) {
                Ok(decision) => RowOutcome::Decided {
                    label: decision.label,
                },
                Err(err) => RowOutcome::Failed {
                    reason: err.to_string(),
                },
            },
        };

        summary.total += 1;
        match &outcome {
            RowOutcome::Decided { label } => {
                summary.decided += 1;
                *summary.labels.entry(*label).or_default() += 1;
            }
            RowOutcome::Rejected { .. } => summary.rejected += 1,
            RowOutcome::Failed { .. } => summary.failed += 1,
        }
        rows.push(BatchRow { line, outcome });
    }

    info!(
        total = summary.total,
        decided = summary.decided,
        rejected = summary.rejected,
        failed = summary.failed,
        "batch scoring finished"
    );

    Ok(BatchReport { rows, summary })
}
