//! coze-proxy - OpenAI-compatible streaming proxy for Coze chat bots
//!
//! This library provides the core functionality for the proxy: request
//! translation, the Coze-to-OpenAI SSE stream translator, configuration,
//! and the HTTP server that ties them together.

pub mod config;
pub mod error;
pub mod proxy;

pub use config::Config;
pub use error::{Error, Result};
