//! Tests for the `sluice` operator CLI.

#![cfg(feature = "cli")]

use std::process::Stdio;

use chrono::{DateTime, Utc};
use sluice::usage::{JsonlUsageStore, UsageStore};
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(dir: &std::path::Path, base_url: &str) -> std::path::PathBuf {
    let usage_path = dir.join("usage.jsonl");
    let config = format!(
        r#"
        [provider]
        api_key = "sk-test"
        base_url = "{base_url}"

        [usage]
        path = {usage_path:?}
        "#
    );
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, config).unwrap();
    config_path
}

async fn sluice(config: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_sluice"))
        .arg("--config")
        .arg(config)
        .args(["--user", "operator"])
        .args(args)
        .stdin(Stdio::null())
        .env_remove("SLUICE_CONFIG")
        .env_remove("SLUICE_USER")
        .output()
        .await
        .unwrap()
}

#[tokio::test]
async fn failed_ask_is_written_to_usage_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), &server.uri());

    let output = sluice(&config, &["ask", "Capital of France?"]).await;
    assert!(!output.status.success());

    let store = JsonlUsageStore::new(dir.path().join("usage.jsonl"));
    let records = store
        .records_since(Some("operator"), DateTime::<Utc>::UNIX_EPOCH)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].operation, "ask");
    assert_eq!(records[0].cost, 0.0);
}

#[tokio::test]
async fn render_needs_no_provider() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:9/v1");

    let output = sluice(
        &config,
        &["render", "issue_summary", "-f", "title=Login fails", "-f", "description=No"],
    )
    .await;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Title: Login fails"));
    assert!(!dir.path().join("usage.jsonl").exists());
}
