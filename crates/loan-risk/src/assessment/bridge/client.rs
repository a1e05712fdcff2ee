use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::assessment::domain::ChatMessage;
use crate::config::AssistantConfig;

/// One outbound chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Value>,
}

/// The assistant's answer: free text, tool calls, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_0".to_string(),
                name: name.into(),
                arguments: arguments.into(),
            }],
        }
    }
}

/// Function call as sent by the service; `arguments` is the raw JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("request to assistant service failed: {0}")]
    Transport(String),
    #[error("assistant service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("assistant response did not match the chat-completion shape: {0}")]
    MalformedResponse(String),
}

/// Hosted tool-calling chat completion endpoint.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ServiceError>;
}

/// Client for OpenAI-compatible `/chat/completions` APIs (Groq, OpenAI, vLLM, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ServiceError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": self.max_tokens,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.clone());
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

#[async_trait]
impl ChatCompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ServiceError> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut builder = self.http.post(&url).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ServiceError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text.chars().take(512).collect(),
            });
        }

        parse_completion(&text)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantPayload,
}

#[derive(Debug, Deserialize)]
struct AssistantPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Decodes a chat-completion body. Some providers send `arguments` as an object
/// instead of a JSON string; both are re-serialised to text for the bridge.
pub fn parse_completion(body: &str) -> Result<ChatCompletion, ServiceError> {
    let envelope: CompletionEnvelope = serde_json::from_str(body)
        .map_err(|err| ServiceError::MalformedResponse(err.to_string()))?;
    let choice = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::MalformedResponse("no choices returned".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: match call.function.arguments {
                Value::String(text) => text,
                Value::Null => String::new(),
                other => other.to_string(),
            },
        })
        .collect();

    Ok(ChatCompletion {
        content: choice.message.content,
        tool_calls,
    })
}
