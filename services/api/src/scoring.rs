use crate::infra::{build_gateway, load_cli_config, model_config};
use clap::Args;
use loan_risk::assessment::conversation::render;
use loan_risk::assessment::{score_csv_path, validate, AssessmentError, BatchReport, RowOutcome};
use loan_risk::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct ScoreArgs {
    /// Applicant age in years (18 to 100)
    #[arg(long)]
    pub(crate) age: Option<u64>,
    /// Annual income in dollars
    #[arg(long)]
    pub(crate) annual_income: Option<u64>,
    /// RENT, OWN, MORTGAGE or OTHER
    #[arg(long)]
    pub(crate) home_ownership: Option<String>,
    /// Years with the current employer
    #[arg(long)]
    pub(crate) employment_length_years: Option<u64>,
    /// EDUCATION, MEDICAL, VENTURE, PERSONAL, DEBT_CONSOLIDATION or HOME_IMPROVEMENT
    #[arg(long)]
    pub(crate) loan_intent: Option<String>,
    /// Grade A (best) through G
    #[arg(long)]
    pub(crate) loan_grade: Option<String>,
    /// Requested amount in dollars
    #[arg(long)]
    pub(crate) loan_amount: Option<u64>,
    /// Annual interest rate in percent
    #[arg(long)]
    pub(crate) interest_rate_pct: Option<f64>,
    /// Y or N
    #[arg(long)]
    pub(crate) prior_default_on_file: Option<String>,
    /// Years of credit history
    #[arg(long)]
    pub(crate) credit_history_length_years: Option<u64>,
    /// Score with this artifact instead of the configured one
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
    /// Print the decision as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV export with one applicant per row
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Score with this artifact instead of the configured one
    #[arg(long)]
    pub(crate) model: Option<PathBuf>,
    /// Print the full report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

impl ScoreArgs {
    /// Raw applicant fields; flags left out stay absent so validation names them.
    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let numbers = [
            ("age", self.age),
            ("annual_income", self.annual_income),
            ("employment_length_years", self.employment_length_years),
            ("loan_amount", self.loan_amount),
            ("credit_history_length_years", self.credit_history_length_years),
        ];
        for (name, value) in numbers {
            if let Some(value) = value {
                fields.insert(name.to_string(), Value::from(value));
            }
        }
        if let Some(rate) = self.interest_rate_pct {
            fields.insert("interest_rate_pct".to_string(), Value::from(rate));
        }
        let labels = [
            ("home_ownership", &self.home_ownership),
            ("loan_intent", &self.loan_intent),
            ("loan_grade", &self.loan_grade),
            ("prior_default_on_file", &self.prior_default_on_file),
        ];
        for (name, value) in labels {
            if let Some(value) = value {
                fields.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        fields
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = load_cli_config()?;
    let policy = config.model.policy();
    let fields = args.fields();
    let gateway = build_gateway(&model_config(&config, args.model));

    let decision = validate(&fields, &policy)
        .map_err(AssessmentError::Validation)
        .and_then(|record| gateway.decide(&record).map_err(AssessmentError::from))?;

    if args.json {
        print_json(&decision)
    } else {
        println!("{}", render::decision_message(&decision));
        Ok(())
    }
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let config = load_cli_config()?;
    let policy = config.model.policy();
    let gateway = build_gateway(&model_config(&config, args.model));

    let report = score_csv_path(&args.csv, &gateway, &policy)?;
    if args.json {
        return print_json(&report);
    }
    for line in report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .rows
        .iter()
        .map(|row| match &row.outcome {
            RowOutcome::Decided { label } => format!("line {}: {}", row.line, label.code()),
            RowOutcome::Rejected { errors } => {
                let problems: Vec<String> = errors.iter().map(ToString::to_string).collect();
                format!("line {}: rejected ({})", row.line, problems.join("; "))
            }
            RowOutcome::Failed { reason } => format!("line {}: failed ({reason})", row.line),
        })
        .collect();

    let summary = &report.summary;
    lines.push(String::new());
    lines.push(format!(
        "{} applicants: {} decided, {} rejected, {} failed",
        summary.total, summary.decided, summary.rejected, summary.failed
    ));
    for (label, count) in &summary.labels {
        lines.push(format!("  {}: {count}", label.code()));
    }
    lines
}
