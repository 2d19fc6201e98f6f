//! OpenAI-compatible request and chunk types, plus the Coze request shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat completion request (OpenAI-compatible).
///
/// Only the fields the proxy maps are modelled; anything else the client
/// sends is ignored. `model` carries the Coze bot id.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Coze conversation to continue, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// A chat message.
///
/// `content` is kept as raw JSON: a string, `null` on assistant tool-call
/// turns, or a multi-part array are all forwarded as sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default = "empty_content")]
    pub content: Value,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            role: String::new(),
            content: empty_content(),
        }
    }
}

fn empty_content() -> Value {
    Value::String(String::new())
}

/// Request body for the Coze v3 chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CozeChatRequest {
    pub bot_id: String,
    pub user_id: String,
    pub stream: bool,
    pub additional_messages: Vec<CozeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// A message in Coze's `additional_messages` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CozeMessage {
    pub role: String,
    pub content: Value,
    pub content_type: String,
}

/// Streaming chunk response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

/// A streaming choice delta.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkChoice {
    pub delta: Delta,
    pub index: u32,
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response.
///
/// Unset fields are omitted, so a default `Delta` serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallDelta>,
    /// Coze tool output, surfaced under a non-standard key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.reasoning_content.is_none()
            && self.function_call.is_none()
            && self.tool_response.is_none()
    }
}

/// Legacy OpenAI `function_call` delta.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionCallDelta {
    pub name: String,
    /// JSON-encoded arguments object.
    pub arguments: String,
}
