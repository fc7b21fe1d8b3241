//! End-to-end CLI tests for the any-downloader binary.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Binary with config lookup pointed at an empty directory.
fn downloader(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("any-downloader").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let config = TempDir::new().unwrap();
    downloader(config.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stream HTTP(S) resources to disk"))
        .stdout(predicate::str::contains("--output-dir"));
}

#[test]
fn test_binary_version_displays_version() {
    let config = TempDir::new().unwrap();
    downloader(config.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("any-downloader"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let config = TempDir::new().unwrap();
    downloader(config.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_empty_stdin_exits_zero() {
    let config = TempDir::new().unwrap();
    downloader(config.path()).write_stdin("").assert().success();
}

#[test]
fn test_binary_unsupported_scheme_exits_one_with_json_event() {
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    downloader(config.path())
        .args(["--json", "-o"])
        .arg(out.path())
        .arg("ftp://example.com/sample.jpg")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""event":"failed""#))
        .stdout(predicate::str::contains(r#""kind":"unsupported_scheme""#));
}

#[test]
fn test_binary_quiet_mode_still_reports_failures() {
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    downloader(config.path())
        .args(["-q", "-o"])
        .arg(out.path())
        .arg("ftp://example.com/sample.jpg")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Transfer failed"))
        .stderr(predicate::str::contains("ftp://example.com/sample.jpg"));
}

#[test]
fn test_binary_rejects_unknown_config_key() {
    let config = TempDir::new().unwrap();
    let app_dir = config.path().join("any-downloader");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("config.toml"), "concurrency = 4\n").unwrap();

    downloader(config.path())
        .arg("https://example.com/a.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_downloads_from_stdin_and_reports_partial_failure() {
    let server = MockServer::start().await;
    for verb in ["HEAD", "GET"] {
        Mock::given(method(verb))
            .and(path("/docs/guide.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"guide body".to_vec()))
            .mount(&server)
            .await;
    }
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let stdin = format!(
        "# reading list\n{uri}/docs/guide.pdf\n\n{uri}/gone\n",
        uri = server.uri()
    );

    let config_path = config.path().to_path_buf();
    let out_path = out.path().to_path_buf();
    let assert = tokio::task::spawn_blocking(move || {
        downloader(&config_path)
            .args(["--json", "-o"])
            .arg(&out_path)
            .write_stdin(stdin)
            .assert()
    })
    .await
    .unwrap();

    assert
        .code(2)
        .stdout(predicate::str::contains(r#""event":"completed""#))
        .stdout(predicate::str::contains(r#""event":"failed""#));
    assert_eq!(
        std::fs::read(out.path().join("guide.pdf")).unwrap(),
        b"guide body"
    );
    assert!(!out.path().join("guide.pdf.part").exists());
}
