//! Text shown to the user and to the assistant.

use std::fmt::Write as _;

use crate::assessment::domain::{Categorical, Decision, DecisionLabel, FieldName, PriorDefault};
use crate::assessment::error::AssessmentError;
use crate::assessment::validation::FieldError;

pub const SYSTEM_PROMPT: &str = "You are a loan default risk advisor for a bank. \
Give clear, polite and detailed information about loan default predictions. \
Gather the applicant details step by step, asking one question at a time, and never ask for everything at once. \
Use upper case for every text value passed to the tool. \
Call the assess_loan_default_risk tool with the details you have collected; \
call it with all ten fields once every detail is known. \
After the result is shown, offer brief feedback and ask whether to assess another applicant.";

pub const WELCOME: &str = "Welcome to the Loan Risk Assessment System. \
Let's analyze the risk profile of the potential borrower. \
Would you like to proceed with the assessment?";

pub const CONSENT_REMINDER: &str =
    "Before we begin I need your go-ahead. Would you like to proceed with the assessment?";

pub const DECLINED: &str =
    "No problem. Whenever you are ready, just say yes and we will start the assessment.";

/// Result card for a decision, listing every input the model saw.
pub fn decision_message(decision: &Decision) -> String {
    let record = &decision.source_record;
    let title = match decision.label {
        DecisionLabel::LowRisk | DecisionLabel::HighRisk => "Risk Assessment Results",
        DecisionLabel::Approved | DecisionLabel::Denied => "Loan Eligibility Results",
    };
    let previous_defaults = match record.prior_default_on_file() {
        PriorDefault::Yes => "Yes",
        PriorDefault::No => "No",
    };

    let mut card = String::new();
    let _ = writeln!(card, "{title}");
    let _ = writeln!(card, "{}", decision.label.headline());
    let _ = writeln!(card);
    let _ = writeln!(card, "Detailed Analysis:");
    let _ = writeln!(card, "- Age: {} years", record.age());
    let _ = writeln!(
        card,
        "- Annual Income: ${}",
        format_thousands(record.annual_income())
    );
    let _ = writeln!(
        card,
        "- Home Ownership: {}",
        record.home_ownership().code()
    );
    let _ = writeln!(
        card,
        "- Employment Length: {} years",
        record.employment_length_years()
    );
    let _ = writeln!(
        card,
        "- Loan Amount: ${}",
        format_thousands(record.loan_amount())
    );
    let _ = writeln!(card, "- Interest Rate: {}%", record.interest_rate_pct());
    let _ = writeln!(card, "- Loan Purpose: {}", record.loan_intent().code());
    let _ = writeln!(card, "- Loan Grade: {}", record.loan_grade().code());
    let _ = writeln!(
        card,
        "- Credit History Length: {} years",
        record.credit_history_length_years()
    );
    let _ = write!(card, "- Previous Defaults: {previous_defaults}");
    card
}

/// Acknowledges what a tool call contributed and asks for the next field. Rejected
/// fields are asked for again before untouched ones.
pub fn collection_message(
    recorded: &[FieldName],
    rejected: &[FieldError],
    missing: &[FieldName],
) -> String {
    let mut parts = Vec::new();

    if !recorded.is_empty() {
        let labels: Vec<&str> = recorded.iter().map(|field| field.label()).collect();
        parts.push(format!("Noted the {}.", labels.join(", ")));
    }
    for error in rejected {
        parts.push(format!(
            "I couldn't use the {}: it {}.",
            error.field.label(),
            error.problem
        ));
    }

    let next = rejected
        .first()
        .map(|error| error.field)
        .or_else(|| missing.first().copied());
    match next {
        Some(field) => parts.push(format!("What is the applicant's {}?", field.label())),
        None => parts.push("I have everything I need.".to_string()),
    }

    parts.join(" ")
}

pub fn failure_message(error: &AssessmentError) -> String {
    match error {
        AssessmentError::Validation(errors) => {
            let details: Vec<String> = errors
                .iter()
                .map(|error| format!("{} {}", error.field.label(), error.problem))
                .collect();
            format!(
                "Some details need another look before I can assess the applicant: {}.",
                details.join("; ")
            )
        }
        AssessmentError::ModelUnavailable { reason } => format!(
            "The risk model is unavailable ({reason}). The details collected so far are kept, \
             but no assessment can be made until the model is restored."
        ),
        AssessmentError::Prediction(err) => format!(
            "The risk model could not score this applicant ({err}). \
             The details collected so far are kept; correct a detail and I will try again."
        ),
        AssessmentError::ServiceUnavailable { reason } => format!(
            "The assistant service could not be reached ({reason}). \
             Nothing was lost; please send your message again."
        ),
    }
}

pub fn already_decided_message(decision: &Decision) -> String {
    format!(
        "This assessment is complete: {}. Say \"new assessment\" to evaluate another applicant.",
        decision.label.headline()
    )
}

/// `1234567` becomes `1,234,567`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
