//! Tests for configuration loading and assembly.

use reliquary::{DEFAULT_LIMITED_BUDGET, ReliquaryConfig, ReliquaryErrorKind, assemble};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("reliquary.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_bundled_defaults_are_valid() {
    let config = ReliquaryConfig::bundled().unwrap();
    config.validate().unwrap();

    assert_eq!(*config.delivery().limited_budget_bytes(), DEFAULT_LIMITED_BUDGET);
    assert!(config.delivery().webhook_url().is_none());
    assert_eq!(config.fetch().limits().rpm, Some(30));
    assert_eq!(config.fetch().limits().max_concurrent, Some(4));
    assert_eq!(
        config.coalesce().wait_timeout(),
        Some(Duration::from_secs(300))
    );
    assert_eq!(*config.lifecycle().retained_histories(), 1024);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        r#"
[delivery]
limited_budget_bytes = 25_000_000
webhook_url = "https://discord.com/api/webhooks/1/token"

[fetch]
rpm = 5
"#,
    );

    let config = ReliquaryConfig::from_file(&path).unwrap();

    assert_eq!(*config.delivery().limited_budget_bytes(), 25_000_000);
    assert_eq!(
        config.delivery().webhook_url().as_deref(),
        Some("https://discord.com/api/webhooks/1/token")
    );
    assert_eq!(config.fetch().limits().rpm, Some(5));
    assert_eq!(config.fetch().limits().max_concurrent, None);
    assert_eq!(*config.fetch().timeout_secs(), 60);
    assert_eq!(config.transform().ffmpeg_path(), Path::new("ffmpeg"));
    assert_eq!(config.coalesce().wait_timeout(), None);
}

#[test]
fn test_zero_budget_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        "[delivery]\nlimited_budget_bytes = 0\n",
    );

    let config = ReliquaryConfig::from_file(&path).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err.kind(), ReliquaryErrorKind::Config(_)));
    assert!(err.to_string().contains("limited_budget_bytes"));
}

#[test]
fn test_zero_wait_timeout_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), "[coalesce]\nwait_timeout_secs = 0\n");

    let err = ReliquaryConfig::from_file(&path)
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(matches!(err.kind(), ReliquaryErrorKind::Config(_)));
    assert!(err.to_string().contains("wait_timeout_secs"));
}

#[test]
fn test_empty_path_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(temp_dir.path(), "[storage]\npath = \"\"\n");

    let err = ReliquaryConfig::from_file(&path)
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(err.to_string().contains("storage.path"));
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = ReliquaryConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err.kind(), ReliquaryErrorKind::Config(_)));
}

#[test]
fn test_malformed_value_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_config(
        temp_dir.path(),
        "[delivery]\nlimited_budget_bytes = \"lots\"\n",
    );
    assert!(ReliquaryConfig::from_file(&path).is_err());
}

fn assembly_config(root: &Path, webhook: Option<&str>) -> ReliquaryConfig {
    let webhook_line = webhook
        .map(|url| format!("webhook_url = \"{url}\"\n"))
        .unwrap_or_default();
    let body = format!(
        r#"
[storage]
path = "{root}/content"

[ledger]
path = "{root}/state/ledger.jsonl"

[delivery]
{webhook_line}cold_store_path = "{root}/public"
public_base_url = "https://cold.example.com"

[coalesce]
wait_timeout_secs = 5
"#,
        root = root.display()
    );
    ReliquaryConfig::from_file(write_config(root, &body)).unwrap()
}

#[tokio::test]
async fn test_assemble_builds_orchestrator() {
    let temp_dir = TempDir::new().unwrap();
    let config = assembly_config(
        temp_dir.path(),
        Some("https://discord.com/api/webhooks/1/token"),
    );

    let orchestrator = assemble(&config).await.unwrap();

    assert_eq!(orchestrator.in_flight(), 0);
    assert!(temp_dir.path().join("content").is_dir());
    assert!(temp_dir.path().join("state").is_dir());
}

#[tokio::test]
async fn test_assemble_requires_webhook() {
    let temp_dir = TempDir::new().unwrap();
    let config = assembly_config(temp_dir.path(), None);

    let err = assemble(&config).await.unwrap_err();
    assert!(matches!(err.kind(), ReliquaryErrorKind::Config(_)));
    assert!(err.to_string().contains("webhook_url"));
}
