use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire names of the ten applicant fields, in the order the assistant collects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Age,
    AnnualIncome,
    HomeOwnership,
    EmploymentLengthYears,
    LoanIntent,
    LoanGrade,
    LoanAmount,
    InterestRatePct,
    PriorDefaultOnFile,
    CreditHistoryLengthYears,
}

impl FieldName {
    pub const ALL: [FieldName; 10] = [
        FieldName::Age,
        FieldName::AnnualIncome,
        FieldName::HomeOwnership,
        FieldName::EmploymentLengthYears,
        FieldName::LoanIntent,
        FieldName::LoanGrade,
        FieldName::LoanAmount,
        FieldName::InterestRatePct,
        FieldName::PriorDefaultOnFile,
        FieldName::CreditHistoryLengthYears,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldName::Age => "age",
            FieldName::AnnualIncome => "annual_income",
            FieldName::HomeOwnership => "home_ownership",
            FieldName::EmploymentLengthYears => "employment_length_years",
            FieldName::LoanIntent => "loan_intent",
            FieldName::LoanGrade => "loan_grade",
            FieldName::LoanAmount => "loan_amount",
            FieldName::InterestRatePct => "interest_rate_pct",
            FieldName::PriorDefaultOnFile => "prior_default_on_file",
            FieldName::CreditHistoryLengthYears => "credit_history_length_years",
        }
    }

    /// Human wording used when prompting for the field.
    pub const fn label(self) -> &'static str {
        match self {
            FieldName::Age => "age",
            FieldName::AnnualIncome => "annual income",
            FieldName::HomeOwnership => "home ownership status",
            FieldName::EmploymentLengthYears => "employment length",
            FieldName::LoanIntent => "loan purpose",
            FieldName::LoanGrade => "loan grade",
            FieldName::LoanAmount => "loan amount",
            FieldName::InterestRatePct => "interest rate",
            FieldName::PriorDefaultOnFile => "prior default on file",
            FieldName::CreditHistoryLengthYears => "credit history length",
        }
    }

    /// Exact wire-name lookup; the tool boundary accepts nothing else.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == raw)
    }

    /// Column lookup for tabular imports, which may carry the credit-risk dataset headers.
    pub fn from_column(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::parse(&normalized).or(match normalized.as_str() {
            "person_age" => Some(FieldName::Age),
            "person_income" => Some(FieldName::AnnualIncome),
            "person_home_ownership" => Some(FieldName::HomeOwnership),
            "person_emp_length" => Some(FieldName::EmploymentLengthYears),
            "loan_amnt" => Some(FieldName::LoanAmount),
            "loan_int_rate" => Some(FieldName::InterestRatePct),
            "cb_person_default_on_file" => Some(FieldName::PriorDefaultOnFile),
            "cb_person_cred_hist_length" => Some(FieldName::CreditHistoryLengthYears),
            _ => None,
        })
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical field whose values are upper-case codes.
pub trait Categorical: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn code(self) -> &'static str;

    /// Case-insensitive lookup. Spaces and hyphens count as underscores, and
    /// underscores are optional so dataset spellings such as `DEBTCONSOLIDATION` match.
    fn from_code(raw: &str) -> Option<Self> {
        let wanted = squash(raw);
        if wanted.is_empty() {
            return None;
        }
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| squash(variant.code()) == wanted)
    }

    fn codes() -> Vec<&'static str> {
        Self::VARIANTS.iter().map(|variant| variant.code()).collect()
    }
}

fn squash(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HomeOwnership {
    Rent,
    Mortgage,
    Own,
    Other,
}

impl Categorical for HomeOwnership {
    const VARIANTS: &'static [Self] = &[Self::Rent, Self::Mortgage, Self::Own, Self::Other];

    fn code(self) -> &'static str {
        match self {
            Self::Rent => "RENT",
            Self::Mortgage => "MORTGAGE",
            Self::Own => "OWN",
            Self::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanIntent {
    Medical,
    DebtConsolidation,
    HomeImprovement,
    Venture,
    Personal,
    Education,
}

impl Categorical for LoanIntent {
    const VARIANTS: &'static [Self] = &[
        Self::Medical,
        Self::DebtConsolidation,
        Self::HomeImprovement,
        Self::Venture,
        Self::Personal,
        Self::Education,
    ];

    fn code(self) -> &'static str {
        match self {
            Self::Medical => "MEDICAL",
            Self::DebtConsolidation => "DEBT_CONSOLIDATION",
            Self::HomeImprovement => "HOME_IMPROVEMENT",
            Self::Venture => "VENTURE",
            Self::Personal => "PERSONAL",
            Self::Education => "EDUCATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanGrade {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl Categorical for LoanGrade {
    const VARIANTS: &'static [Self] = &[
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
    ];

    fn code(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorDefault {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Categorical for PriorDefault {
    const VARIANTS: &'static [Self] = &[Self::Yes, Self::No];

    fn code(self) -> &'static str {
        match self {
            Self::Yes => "Y",
            Self::No => "N",
        }
    }
}

/// Fully validated applicant. Only `validation::validate` constructs one, so holding a
/// value means every field is present and within its constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicantRecord {
    pub(crate) age: u8,
    pub(crate) annual_income: u64,
    pub(crate) home_ownership: HomeOwnership,
    pub(crate) employment_length_years: u8,
    pub(crate) loan_intent: LoanIntent,
    pub(crate) loan_grade: LoanGrade,
    pub(crate) loan_amount: u64,
    pub(crate) interest_rate_pct: f64,
    pub(crate) prior_default_on_file: PriorDefault,
    pub(crate) credit_history_length_years: u8,
}

impl ApplicantRecord {
    pub fn age(&self) -> u8 {
        self.age
    }

    pub fn annual_income(&self) -> u64 {
        self.annual_income
    }

    pub fn home_ownership(&self) -> HomeOwnership {
        self.home_ownership
    }

    pub fn employment_length_years(&self) -> u8 {
        self.employment_length_years
    }

    pub fn loan_intent(&self) -> LoanIntent {
        self.loan_intent
    }

    pub fn loan_grade(&self) -> LoanGrade {
        self.loan_grade
    }

    pub fn loan_amount(&self) -> u64 {
        self.loan_amount
    }

    pub fn interest_rate_pct(&self) -> f64 {
        self.interest_rate_pct
    }

    pub fn prior_default_on_file(&self) -> PriorDefault {
        self.prior_default_on_file
    }

    pub fn credit_history_length_years(&self) -> u8 {
        self.credit_history_length_years
    }

    /// Continuous inputs in model-row order.
    pub fn numeric_features(&self) -> [(FieldName, f64); 6] {
        [
            (FieldName::Age, f64::from(self.age)),
            (FieldName::AnnualIncome, self.annual_income as f64),
            (
                FieldName::EmploymentLengthYears,
                f64::from(self.employment_length_years),
            ),
            (FieldName::LoanAmount, self.loan_amount as f64),
            (FieldName::InterestRatePct, self.interest_rate_pct),
            (
                FieldName::CreditHistoryLengthYears,
                f64::from(self.credit_history_length_years),
            ),
        ]
    }

    /// Categorical inputs as their normalized codes.
    pub fn categorical_features(&self) -> [(FieldName, &'static str); 4] {
        [
            (FieldName::HomeOwnership, self.home_ownership.code()),
            (FieldName::LoanIntent, self.loan_intent.code()),
            (FieldName::LoanGrade, self.loan_grade.code()),
            (FieldName::PriorDefaultOnFile, self.prior_default_on_file.code()),
        ]
    }
}

/// Fields gathered so far in a conversation. Every stored value has already passed
/// its individual field check and is held in normalized JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PartialRecord {
    fields: BTreeMap<FieldName, Value>,
}

impl PartialRecord {
    /// Last write wins; returns the value that was replaced.
    pub fn merge(&mut self, field: FieldName, value: Value) -> Option<Value> {
        self.fields.insert(field, value)
    }

    pub fn remove(&mut self, field: FieldName) -> Option<Value> {
        self.fields.remove(&field)
    }

    pub fn get(&self, field: FieldName) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn collected(&self) -> &BTreeMap<FieldName, Value> {
        &self.fields
    }

    pub fn missing(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|field| !self.fields.contains_key(field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        FieldName::ALL
            .iter()
            .all(|field| self.fields.contains_key(field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Raw mapping in wire names, suitable for `validation::validate`.
    pub fn to_raw(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.clone()))
            .collect()
    }
}

/// How a deployment words the classifier's positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFraming {
    /// Class 1 means the borrower is likely to default.
    DefaultRisk,
    /// Class 1 means the loan is approved.
    Approval,
}

impl LabelFraming {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "default_risk" | "risk" => Some(Self::DefaultRisk),
            "approval" => Some(Self::Approval),
            _ => None,
        }
    }

    pub const fn label_for(self, class: ModelClass) -> DecisionLabel {
        match (self, class) {
            (Self::DefaultRisk, ModelClass::Positive) => DecisionLabel::HighRisk,
            (Self::DefaultRisk, ModelClass::Negative) => DecisionLabel::LowRisk,
            (Self::Approval, ModelClass::Positive) => DecisionLabel::Approved,
            (Self::Approval, ModelClass::Negative) => DecisionLabel::Denied,
        }
    }

    /// The two labels this framing can produce.
    pub const fn labels(self) -> [DecisionLabel; 2] {
        [
            self.label_for(ModelClass::Negative),
            self.label_for(ModelClass::Positive),
        ]
    }
}

/// Binary output of the classifier before framing is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    Negative,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionLabel {
    LowRisk,
    HighRisk,
    Approved,
    Denied,
}

impl DecisionLabel {
    pub const fn code(self) -> &'static str {
        match self {
            DecisionLabel::LowRisk => "LOW_RISK",
            DecisionLabel::HighRisk => "HIGH_RISK",
            DecisionLabel::Approved => "APPROVED",
            DecisionLabel::Denied => "DENIED",
        }
    }

    pub const fn headline(self) -> &'static str {
        match self {
            DecisionLabel::LowRisk => "Low Default Risk",
            DecisionLabel::HighRisk => "High Default Risk",
            DecisionLabel::Approved => "Loan Approved",
            DecisionLabel::Denied => "Loan Denied",
        }
    }

    pub const fn is_favorable(self) -> bool {
        matches!(self, DecisionLabel::LowRisk | DecisionLabel::Approved)
    }
}

impl fmt::Display for DecisionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Gateway output: the label plus the record that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub label: DecisionLabel,
    pub source_record: ApplicantRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged entry of the conversation history sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
