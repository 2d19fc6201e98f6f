//! Inbound request to Coze request translation.

use axum::http::{header, HeaderMap};

use super::types::{ChatCompletionRequest, CozeChatRequest, CozeMessage};
use crate::config::ApiKey;
use crate::error::{Error, Result};

/// Name reported when the bot id is missing.
pub const MODEL_PARAMETER: &str = "model (COZE_BOT_ID)";

/// Coze content type for plain messages.
const TEXT_CONTENT_TYPE: &str = "text";

/// Map an OpenAI-style request onto the Coze v3 chat request.
///
/// `model` becomes the bot id and is required. `conversation_id` is carried
/// over only when non-empty so Coze never sees a null or blank id.
pub fn translate_request(request: &ChatCompletionRequest, user_id: &str) -> Result<CozeChatRequest> {
    let bot_id = request
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::MissingParameter(MODEL_PARAMETER.to_string()))?;

    let additional_messages = request
        .messages
        .iter()
        .map(|m| CozeMessage {
            role: m.role.clone(),
            content: m.content.clone(),
            content_type: TEXT_CONTENT_TYPE.to_string(),
        })
        .collect();

    let conversation_id = request
        .conversation_id
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(CozeChatRequest {
        bot_id: bot_id.to_string(),
        user_id: user_id.to_string(),
        stream: request.stream.unwrap_or(false),
        additional_messages,
        conversation_id,
    })
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_credential(headers: &HeaderMap) -> Result<ApiKey> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| token.split_whitespace().next())
        .map(ApiKey::from)
        .ok_or(Error::MissingCredential)
}
