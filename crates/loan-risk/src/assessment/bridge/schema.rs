use serde_json::{json, Map, Value};

use crate::assessment::domain::{
    Categorical, FieldName, HomeOwnership, LoanGrade, LoanIntent, PriorDefault,
};
use crate::assessment::validation::SchemaPolicy;

pub const TOOL_NAME: &str = "assess_loan_default_risk";

/// Function definition in the OpenAI tools format. All ten fields are required and
/// the bounds match what `validation` enforces for the same policy.
pub fn tool_definition(policy: &SchemaPolicy) -> Value {
    let properties: Map<String, Value> = FieldName::ALL
        .into_iter()
        .map(|field| (field.as_str().to_string(), property(field, policy)))
        .collect();
    let required: Vec<&str> = FieldName::ALL.iter().map(|field| field.as_str()).collect();

    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Predict the loan default risk of an applicant with the trained model. \
                            Call only once every field is known.",
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }
        }
    })
}

fn property(field: FieldName, policy: &SchemaPolicy) -> Value {
    match field {
        FieldName::Age => integer(18, Some(100), "Age of the applicant in years"),
        FieldName::AnnualIncome => integer(0, None, "Annual income of the applicant in dollars"),
        FieldName::HomeOwnership => choice::<HomeOwnership>("Home ownership status"),
        FieldName::EmploymentLengthYears => {
            integer(0, Some(50), "Length of employment in years")
        }
        FieldName::LoanIntent => choice::<LoanIntent>("Purpose of the loan"),
        FieldName::LoanGrade => choice::<LoanGrade>("Grade of the loan"),
        FieldName::LoanAmount => integer(0, None, "Requested loan amount in dollars"),
        FieldName::InterestRatePct => json!({
            "type": "number",
            "minimum": 0,
            "maximum": policy.interest_rate_cap,
            "description": "Interest rate of the loan as a percentage",
        }),
        FieldName::PriorDefaultOnFile => {
            choice::<PriorDefault>("Whether the applicant has a default on file")
        }
        FieldName::CreditHistoryLengthYears => {
            integer(0, Some(60), "Length of credit history in years")
        }
    }
}

fn integer(minimum: u64, maximum: Option<u64>, description: &str) -> Value {
    let mut schema = json!({
        "type": "integer",
        "minimum": minimum,
        "description": description,
    });
    if let Some(maximum) = maximum {
        schema["maximum"] = json!(maximum);
    }
    schema
}

fn choice<T: Categorical>(description: &str) -> Value {
    json!({
        "type": "string",
        "enum": T::codes(),
        "description": description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::domain::LabelFraming;

    #[test]
    fn schema_requires_every_field() {
        let schema = tool_definition(&SchemaPolicy::default());
        let parameters = &schema["function"]["parameters"];
        let required = parameters["required"].as_array().expect("required list");
        assert_eq!(required.len(), 10);
        assert_eq!(
            parameters["properties"]["loan_intent"]["enum"][1],
            "DEBT_CONSOLIDATION"
        );
        assert_eq!(schema["function"]["name"], TOOL_NAME);
    }

    #[test]
    fn interest_bound_mirrors_policy() {
        let policy = SchemaPolicy {
            interest_rate_cap: 30.0,
            framing: LabelFraming::Approval,
        };
        let schema = tool_definition(&policy);
        assert_eq!(
            schema["function"]["parameters"]["properties"]["interest_rate_pct"]["maximum"],
            30.0
        );
    }
}
