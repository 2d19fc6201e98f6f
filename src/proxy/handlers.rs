//! HTTP request handlers.

use axum::{
    body::{Body, Bytes},
    extract::{Extension, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::server::{AppState, RequestId};
use super::stream::{translate_sse_stream, ChunkLabels};
use super::translate::{bearer_credential, translate_request};
use super::types::ChatCompletionRequest;
use crate::error::{Error, Result};

/// Parse the inbound body, treating an empty body or `null` as `{}`.
fn parse_request(body: &[u8]) -> Result<ChatCompletionRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ChatCompletionRequest::default());
    }

    serde_json::from_slice::<Option<ChatCompletionRequest>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| Error::BadRequest(e.to_string()))
}

/// Handle POST /v1/chat/completions
///
/// Validation happens before any upstream traffic: a missing bot id or
/// credential is answered with 400 and nothing is sent to Coze.
pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let request = parse_request(&body)?;
    let coze_request = translate_request(&request, &state.config.upstream.user_id)?;
    let credential = bearer_credential(&headers)?;

    tracing::info!(
        request_id = %request_id.0,
        bot_id = %coze_request.bot_id,
        stream = coze_request.stream,
        messages = coze_request.additional_messages.len(),
        conversation_id = ?coze_request.conversation_id,
        "Received chat completion request"
    );

    let upstream_response = state
        .http_client
        .post(&state.config.upstream.url)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", credential.expose_secret()),
        )
        .json(&coze_request)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(request_id = %request_id.0, error = %e, "Failed to reach upstream");
            Error::Upstream(e)
        })?;

    let status = upstream_response.status();
    if !status.is_success() {
        let error_body = upstream_response.text().await.unwrap_or_default();
        tracing::error!(
            request_id = %request_id.0,
            status = %status,
            body = %error_body,
            "Upstream returned error"
        );
        return Err(Error::UpstreamStatus {
            status: status.as_u16(),
            body: error_body,
        });
    }

    if coze_request.stream {
        let labels = ChunkLabels::from(&state.config.downstream);
        streaming_response(upstream_response, labels)
    } else {
        non_streaming_response(upstream_response).await
    }
}

/// Relay the upstream SSE body through the stream translator.
fn streaming_response(upstream_response: reqwest::Response, labels: ChunkLabels) -> Result<Response> {
    let stream = translate_sse_stream(upstream_response.bytes_stream(), labels);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Return the upstream JSON object as-is.
async fn non_streaming_response(upstream_response: reqwest::Response) -> Result<Response> {
    let body: serde_json::Value = upstream_response.json().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to parse upstream response");
        Error::Upstream(e)
    })?;

    Ok(Json(body).into_response())
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "coze-proxy"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_body_is_default() {
        let request = parse_request(b"").unwrap();
        assert!(request.model.is_none());

        let request = parse_request(b"  \n").unwrap();
        assert!(request.model.is_none());
    }

    #[test]
    fn test_parse_null_body_is_default() {
        let request = parse_request(b"null").unwrap();
        assert!(request.model.is_none());
        assert!(request.messages.is_empty());
    }

    #[test]
    fn test_parse_invalid_json_is_bad_request() {
        let err = parse_request(b"{not json").unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_null_and_array_content() {
        let request = parse_request(
            br#"{"model":"botX","messages":[{"role":"assistant","content":null},{"role":"user","content":[{"type":"text","text":"hi"}]}]}"#,
        )
        .unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.is_null());
        assert!(request.messages[1].content.is_array());
    }

    #[test]
    fn test_parse_full_body() {
        let request = parse_request(
            br#"{"model":"botX","messages":[{"role":"user","content":"hi"}],"stream":true,"conversation_id":"c1"}"#,
        )
        .unwrap();
        assert_eq!(request.model.as_deref(), Some("botX"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.conversation_id.as_deref(), Some("c1"));
    }
}
