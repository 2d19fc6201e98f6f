//! Configuration parsing and validation for coze-proxy.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
///
/// Every section is optional; a missing file section falls back to the
/// defaults below, so `Config::default()` is a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub downstream: DownstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:5000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Coze chat endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Full URL of the Coze v3 chat endpoint
    #[serde(default = "default_upstream_url")]
    pub url: String,
    /// Fixed `user_id` sent with every upstream request
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// TCP connect timeout in seconds. No overall timeout is applied, since
    /// streamed answers may legitimately run for minutes.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_upstream_url() -> String {
    "https://api.coze.cn/v3/chat".to_string()
}

fn default_user_id() -> String {
    "milo".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            user_id: default_user_id(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Labels stamped on every emitted `chat.completion.chunk`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownstreamConfig {
    /// Value of the chunk `model` field
    #[serde(default = "default_model_label")]
    pub model: String,
    /// Value of the chunk `id` field
    #[serde(default = "default_chunk_id")]
    pub id: String,
}

fn default_model_label() -> String {
    "coze-proxy".to_string()
}

fn default_chunk_id() -> String {
    "chatcmpl-xxxxx".to_string()
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            model: default_model_label(),
            id: default_chunk_id(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level for this crate when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Bearer credential wrapper that redacts in Debug/Display and zeroizes on drop.
///
/// Credentials are forwarded from the inbound request to Coze untouched and
/// must never show up in logs.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// from the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}` references
    /// from the environment.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration using a custom variable lookup.
    fn parse_str_with<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.upstream.url = expand_env_vars_with(&config.upstream.url, "upstream.url", &lookup)?;
        config.upstream.user_id =
            expand_env_vars_with(&config.upstream.user_id, "upstream.user_id", &lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.upstream.url;
        if url.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.url must not be empty".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "upstream.url '{}' must start with http:// or https://",
                url
            )));
        }
        if self.upstream.user_id.is_empty() {
            return Err(ConfigError::Validation(
                "upstream.user_id must not be empty".to_string(),
            ));
        }
        if self.downstream.model.is_empty() {
            return Err(ConfigError::Validation(
                "downstream.model must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set for '{field}': {message}")]
    EnvVar {
        var: String,
        field: String,
        message: String,
    },
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v3/chat`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, field: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            field: field.to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                field: field.to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            field: field.to_string(),
            message: format!("Environment variable '{}' is not set", var_name),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}
