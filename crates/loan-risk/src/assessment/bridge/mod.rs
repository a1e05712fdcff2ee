//! Tool-call bridge between the conversation and the hosted assistant.
//!
//! Every turn sends the full history plus the one applicant tool. The reply is reduced
//! to a tagged result: free text becomes `Clarify`, a well-formed call of the
//! applicant tool becomes `Decide`. Anything else the service sends back is treated as
//! a `Clarify` with a generic re-prompt so candidate fields are never half-applied.

mod client;
mod schema;

pub use client::{
    parse_completion, ChatCompletion, ChatCompletionClient, ChatRequest, OpenAiCompatibleClient,
    ServiceError, ToolCall,
};
pub use schema::{tool_definition, TOOL_NAME};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::domain::{ChatMessage, FieldName};
use super::validation::SchemaPolicy;

pub const GENERIC_REPROMPT: &str =
    "Sorry, I didn't quite catch that. Could you restate the applicant details you just gave?";

/// Candidate values for known schema fields, not yet validated.
pub type CandidateFields = BTreeMap<FieldName, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeResult {
    Clarify(String),
    Decide(CandidateFields),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("assistant service unavailable: {reason}")]
    ServiceUnavailable { reason: String },
}

pub struct ToolCallBridge<C: ?Sized> {
    client: Arc<C>,
    tool: Value,
    timeout: Duration,
}

impl<C> ToolCallBridge<C>
where
    C: ChatCompletionClient + ?Sized + 'static,
{
    pub fn new(client: Arc<C>, policy: &SchemaPolicy, timeout: Duration) -> Self {
        Self {
            client,
            tool: tool_definition(policy),
            timeout,
        }
    }

    pub async fn turn(&self, history: &[ChatMessage]) -> Result<BridgeResult, BridgeError> {
        let request = ChatRequest {
            messages: history.to_vec(),
            tools: vec![self.tool.clone()],
        };

        let completion = match tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(ServiceError::MalformedResponse(reason))) => {
                warn!(%reason, "assistant reply had an unexpected shape");
                return Ok(BridgeResult::Clarify(GENERIC_REPROMPT.to_string()));
            }
            Ok(Err(err)) => {
                warn!(error = %err, "assistant service call failed");
                return Err(BridgeError::ServiceUnavailable {
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "assistant service timed out");
                return Err(BridgeError::ServiceUnavailable {
                    reason: format!(
                        "no response within {:.1}s",
                        self.timeout.as_secs_f64()
                    ),
                });
            }
        };

        Ok(interpret(completion))
    }
}

/// Reduces a completion to `Clarify` or `Decide`.
pub fn interpret(completion: ChatCompletion) -> BridgeResult {
    let ChatCompletion {
        content,
        mut tool_calls,
    } = completion;

    match tool_calls.len() {
        0 => {
            let text = content
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| GENERIC_REPROMPT.to_string());
            BridgeResult::Clarify(text)
        }
        1 => match candidate_fields(tool_calls.remove(0)) {
            Some(fields) => BridgeResult::Decide(fields),
            None => BridgeResult::Clarify(GENERIC_REPROMPT.to_string()),
        },
        count => {
            debug!(count, "assistant issued more than one tool call");
            BridgeResult::Clarify(GENERIC_REPROMPT.to_string())
        }
    }
}

fn candidate_fields(call: ToolCall) -> Option<CandidateFields> {
    if call.name != TOOL_NAME {
        debug!(tool = %call.name, "assistant called an unknown tool");
        return None;
    }

    let arguments = match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Object(arguments)) => arguments,
        Ok(_) | Err(_) => {
            debug!("tool arguments were not a JSON object");
            return None;
        }
    };

    let mut fields = CandidateFields::new();
    for (key, value) in arguments {
        let Some(field) = FieldName::parse(&key) else {
            debug!(field = %key, "tool arguments named an unknown field");
            return None;
        };
        // A null means the assistant has no value yet; it is not a candidate.
        if !value.is_null() {
            fields.insert(field, value);
        }
    }

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}
