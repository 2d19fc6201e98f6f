//! HTTP proxy server module.
//!
//! This module provides the OpenAI-compatible HTTP API that accepts chat
//! completion requests, forwards them to Coze and translates the streamed
//! answer back.

mod handlers;
mod server;
pub mod stream;
pub mod translate;
pub mod types;

pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use stream::{translate_sse_stream, ChunkLabels, Frame, StreamTranslator, DONE_FRAME};
pub use translate::{bearer_credential, translate_request};
pub use types::{ChatCompletionChunk, ChatCompletionRequest, CozeChatRequest, Message};
