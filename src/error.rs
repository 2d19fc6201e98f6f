//! Error types for coze-proxy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for coze-proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the client before streaming begins.
///
/// Anything that goes wrong after the first byte of a streaming response is
/// handled inside [`crate::proxy::stream`] and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Missing or invalid Authorization header")]
    MissingCredential,

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingParameter(_) | Error::MissingCredential | Error::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Upstream(_) | Error::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Flat `{"error": "..."}` body, the shape existing Coze proxy clients expect
        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
