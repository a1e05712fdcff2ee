use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::{
    ApplicantRecord, Categorical, FieldName, HomeOwnership, LabelFraming, LoanGrade, LoanIntent,
    PriorDefault,
};

pub const DEFAULT_INTEREST_RATE_CAP: f64 = 100.0;

/// Canonical schema variant enforced by one deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemaPolicy {
    pub interest_rate_cap: f64,
    pub framing: LabelFraming,
}

impl Default for SchemaPolicy {
    fn default() -> Self {
        Self {
            interest_rate_cap: DEFAULT_INTEREST_RATE_CAP,
            framing: LabelFraming::DefaultRisk,
        }
    }
}

/// A single field that failed its presence, type, or constraint check.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{field}: {problem}")]
pub struct FieldError {
    pub field: FieldName,
    pub problem: FieldProblem,
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldProblem {
    #[error("value is required")]
    Missing,
    #[error("expected {expected}")]
    WrongType { expected: &'static str },
    #[error("must be {range}")]
    OutOfRange { range: String },
    #[error("is too large")]
    TooLarge,
    #[error("must be one of {}", .allowed.join(", "))]
    NotAllowed { allowed: Vec<&'static str> },
}

/// Validates a raw field mapping into a complete record, reporting every bad field.
///
/// Keys outside the ten-field schema are ignored here; the tool boundary rejects them
/// before candidate fields ever reach this point.
pub fn validate(
    raw: &Map<String, Value>,
    policy: &SchemaPolicy,
) -> Result<ApplicantRecord, Vec<FieldError>> {
    let mut errors = Vec::new();

    let age = check(&mut errors, raw, FieldName::Age, |v| small(v, 18, 100));
    let annual_income = check(&mut errors, raw, FieldName::AnnualIncome, |v| {
        integer(v, 0, None)
    });
    let home_ownership = check(
        &mut errors,
        raw,
        FieldName::HomeOwnership,
        choice::<HomeOwnership>,
    );
    let employment_length_years = check(&mut errors, raw, FieldName::EmploymentLengthYears, |v| {
        small(v, 0, 50)
    });
    let loan_intent = check(&mut errors, raw, FieldName::LoanIntent, choice::<LoanIntent>);
    let loan_grade = check(&mut errors, raw, FieldName::LoanGrade, choice::<LoanGrade>);
    let loan_amount = check(&mut errors, raw, FieldName::LoanAmount, |v| {
        integer(v, 0, None)
    });
    let interest_rate_pct = check(&mut errors, raw, FieldName::InterestRatePct, |v| {
        rate(v, policy.interest_rate_cap)
    });
    let prior_default_on_file = check(
        &mut errors,
        raw,
        FieldName::PriorDefaultOnFile,
        choice::<PriorDefault>,
    );
    let credit_history_length_years =
        check(&mut errors, raw, FieldName::CreditHistoryLengthYears, |v| {
            small(v, 0, 60)
        });

    match (
        age,
        annual_income,
        home_ownership,
        employment_length_years,
        loan_intent,
        loan_grade,
        loan_amount,
        interest_rate_pct,
        prior_default_on_file,
        credit_history_length_years,
    ) {
        (
            Some(age),
            Some(annual_income),
            Some(home_ownership),
            Some(employment_length_years),
            Some(loan_intent),
            Some(loan_grade),
            Some(loan_amount),
            Some(interest_rate_pct),
            Some(prior_default_on_file),
            Some(credit_history_length_years),
        ) => Ok(ApplicantRecord {
            age,
            annual_income,
            home_ownership,
            employment_length_years,
            loan_intent,
            loan_grade,
            loan_amount,
            interest_rate_pct,
            prior_default_on_file,
            credit_history_length_years,
        }),
        _ => Err(errors),
    }
}

/// Checks one field in isolation and returns its normalized JSON form: integers as
/// unsigned numbers, the interest rate as a float, categorical codes upper-cased.
pub fn validate_field(
    field: FieldName,
    value: &Value,
    policy: &SchemaPolicy,
) -> Result<Value, FieldProblem> {
    if value.is_null() {
        return Err(FieldProblem::Missing);
    }

    match field {
        FieldName::Age => small(value, 18, 100).map(Value::from),
        FieldName::AnnualIncome | FieldName::LoanAmount => {
            integer(value, 0, None).map(Value::from)
        }
        FieldName::EmploymentLengthYears => small(value, 0, 50).map(Value::from),
        FieldName::CreditHistoryLengthYears => small(value, 0, 60).map(Value::from),
        FieldName::InterestRatePct => rate(value, policy.interest_rate_cap).map(Value::from),
        FieldName::HomeOwnership => choice::<HomeOwnership>(value).map(code_value),
        FieldName::LoanIntent => choice::<LoanIntent>(value).map(code_value),
        FieldName::LoanGrade => choice::<LoanGrade>(value).map(code_value),
        FieldName::PriorDefaultOnFile => choice::<PriorDefault>(value).map(code_value),
    }
}

fn check<T>(
    errors: &mut Vec<FieldError>,
    raw: &Map<String, Value>,
    field: FieldName,
    parse: impl FnOnce(&Value) -> Result<T, FieldProblem>,
) -> Option<T> {
    let outcome = match raw.get(field.as_str()) {
        None | Some(Value::Null) => Err(FieldProblem::Missing),
        Some(value) => parse(value),
    };
    outcome
        .map_err(|problem| errors.push(FieldError { field, problem }))
        .ok()
}

fn code_value<T: Categorical>(choice: T) -> Value {
    Value::String(choice.code().to_string())
}

fn small(value: &Value, min: u8, max: u8) -> Result<u8, FieldProblem> {
    let parsed = integer(value, u64::from(min), Some(u64::from(max)))?;
    u8::try_from(parsed).map_err(|_| FieldProblem::OutOfRange {
        range: format!("between {min} and {max}"),
    })
}

fn integer(value: &Value, min: u64, max: Option<u64>) -> Result<u64, FieldProblem> {
    let out_of_range = || FieldProblem::OutOfRange {
        range: match max {
            Some(max) => format!("between {min} and {max}"),
            None => format!("at least {min}"),
        },
    };

    let parsed = match value {
        Value::Number(number) => whole_number(number),
        Value::String(text) => {
            let cleaned = clean_numeric(text);
            match cleaned.parse::<u64>() {
                Ok(exact) => Ok(exact),
                Err(_) => cleaned
                    .parse::<serde_json::Number>()
                    .map_err(|_| WholeNumber::NotWhole)
                    .and_then(|number| whole_number(&number)),
            }
        }
        _ => Err(WholeNumber::NotWhole),
    };

    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(WholeNumber::NotWhole) => {
            return Err(FieldProblem::WrongType {
                expected: "a whole number",
            })
        }
        Err(WholeNumber::Negative) => return Err(out_of_range()),
        Err(WholeNumber::TooLarge) => return Err(FieldProblem::TooLarge),
    };

    if parsed < min || max.map(|max| parsed > max).unwrap_or(false) {
        return Err(out_of_range());
    }
    Ok(parsed)
}

enum WholeNumber {
    NotWhole,
    Negative,
    TooLarge,
}

/// Exact integers come through untouched; floats only when they are whole and small
/// enough that no digits were lost in parsing.
fn whole_number(number: &serde_json::Number) -> Result<u64, WholeNumber> {
    if let Some(exact) = number.as_u64() {
        return Ok(exact);
    }
    if number.as_i64().is_some() {
        return Err(WholeNumber::Negative);
    }
    let float = number
        .as_f64()
        .filter(|float| float.is_finite() && float.fract() == 0.0)
        .ok_or(WholeNumber::NotWhole)?;
    if float < 0.0 {
        Err(WholeNumber::Negative)
    } else if float > MAX_EXACT_FLOAT {
        Err(WholeNumber::TooLarge)
    } else {
        Ok(float as u64)
    }
}

/// 2^53: above this an `f64` no longer holds every integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

fn rate(value: &Value, cap: f64) -> Result<f64, FieldProblem> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => clean_numeric(text).parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
    .ok_or(FieldProblem::WrongType {
        expected: "a number",
    })?;

    if !(0.0..=cap).contains(&parsed) {
        return Err(FieldProblem::OutOfRange {
            range: format!("between 0 and {cap}"),
        });
    }
    Ok(parsed)
}

fn choice<T: Categorical>(value: &Value) -> Result<T, FieldProblem> {
    let text = value.as_str().ok_or(FieldProblem::WrongType {
        expected: "a text code",
    })?;
    T::from_code(text).ok_or_else(|| FieldProblem::NotAllowed {
        allowed: T::codes(),
    })
}

/// Strips the decoration people type around numbers: `$50,000`, `12.5%`, `1_000`.
fn clean_numeric(text: &str) -> String {
    text.trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect()
}
