//! Integration tests for loading configuration files.
//!
//! Exercises the end-to-end flow: TOML file -> parse -> `${VAR}` expansion
//! -> validation. Each test uses its own temp directory and env var names to
//! avoid parallel test interference.

use coze_proxy::config::{Config, ConfigError};
use std::fs;

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).expect("Failed to write temp config");
    path
}

#[test]
fn test_env_expansion_in_upstream_url() {
    let var_name = "COZE_PROXY_TEST_UPSTREAM_HOST";
    std::env::set_var(var_name, "api.coze.com");

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[upstream]
url = "https://${{{}}}/v3/chat"
"#,
            var_name
        ),
    );

    let config = Config::from_file(&path).expect("config should load");
    assert_eq!(config.upstream.url, "https://api.coze.com/v3/chat");

    std::env::remove_var(var_name);
}

#[test]
fn test_missing_env_var_fails_with_name() {
    let var_name = "COZE_PROXY_TEST_DEFINITELY_MISSING";
    std::env::remove_var(var_name);

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
[upstream]
user_id = "${{{}}}"
"#,
            var_name
        ),
    );

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::EnvVar { .. }));
    assert!(
        err.to_string().contains(var_name),
        "Error should name the variable: {}",
        err
    );
}

#[test]
fn test_full_file_round_trips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
listen = "0.0.0.0:5000"

[upstream]
url = "https://api.coze.cn/v3/chat"
user_id = "bridge"
connect_timeout_secs = 5

[downstream]
model = "coze-bot"
id = "chatcmpl-bridge"

[logging]
level = "debug"
"#,
    );

    let config = Config::from_file(&path).unwrap();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = Config::parse_str(&rendered).unwrap();

    assert_eq!(reparsed.server.listen, "0.0.0.0:5000");
    assert_eq!(reparsed.upstream.user_id, "bridge");
    assert_eq!(reparsed.upstream.connect_timeout_secs, 5);
    assert_eq!(reparsed.downstream.model, "coze-bot");
    assert_eq!(reparsed.downstream.id, "chatcmpl-bridge");
    assert_eq!(reparsed.logging.level, "debug");
}

#[test]
fn test_invalid_file_reports_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[upstream]
url = ""
"#,
    );

    let err = Config::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}
