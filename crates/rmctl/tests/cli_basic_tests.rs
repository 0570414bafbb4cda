use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test command isolated from the user's environment
fn rmctl() -> Command {
    let mut cmd = Command::cargo_bin("rmctl").unwrap();
    cmd.env_remove("RMCTL_PROFILE")
        .env_remove("RMCTL_CONFIG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Config file with a single default profile pointing at `endpoint`
fn config_with_profile(dir: &TempDir, endpoint: &str) -> String {
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            r#"
default_profile = "mock"

[profiles.mock]
endpoint = "{endpoint}"
api_version = "2024-03-01"

[profiles.mock.polling]
min_delay_ms = 10
initial_delay_ms = 10
max_delay_ms = 50
"#
        ),
    )
    .unwrap();
    path.display().to_string()
}

#[test]
fn test_help_flag() {
    rmctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("long-running operations"))
        .stdout(predicate::str::contains("EXAMPLES:"));
}

#[test]
fn test_version_flag() {
    rmctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rmctl"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_help() {
    rmctl()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_subcommand() {
    rmctl()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_operation_start_requires_method_and_target() {
    rmctl()
        .args(["operation", "start", "--target", "/snapshots/a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--method"));
}

// ============================================================================
// Profiles
// ============================================================================

#[test]
fn test_profile_list_empty() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");

    rmctl()
        .args(["--config-file", config.to_str().unwrap(), "profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No profiles configured"));
}

#[test]
fn test_profile_set_list_show_remove() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    let config = config.to_str().unwrap();

    rmctl()
        .args([
            "--config-file",
            config,
            "profile",
            "set",
            "lab",
            "--endpoint",
            "https://management.example.test",
            "--api-version",
            "2024-03-01",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'lab' saved"));

    rmctl()
        .args(["--config-file", config, "profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* lab"));

    rmctl()
        .args(["--config-file", config, "profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"api_version\": \"2024-03-01\""))
        .stdout(predicate::str::contains("\"default\": true"));

    rmctl()
        .args(["--config-file", config, "profile", "remove", "lab"])
        .assert()
        .success();

    rmctl()
        .args(["--config-file", config, "profile", "show", "lab"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_profile_set_rejects_invalid_endpoint() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");

    rmctl()
        .args([
            "--config-file",
            config.to_str().unwrap(),
            "profile",
            "set",
            "bad",
            "--endpoint",
            "not a url",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid endpoint"));
    assert!(!config.exists());
}

// ============================================================================
// Operations against a mock control plane
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_start_and_wait() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/snapshots/snap1"))
        .and(query_param("api-version", "2024-03-01"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Azure-AsyncOperation",
            format!("{}/operations/op1", server.uri()),
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/snapshots/snap1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "/snapshots/snap1",
            "name": "snap1"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_with_profile(&dir, &server.uri());

    tokio::task::spawn_blocking(move || {
        rmctl()
            .args([
                "--config-file",
                &config,
                "operation",
                "start",
                "--method",
                "put",
                "--target",
                "/snapshots/snap1",
                "--body",
                r#"{"location": "westus2"}"#,
                "--wait",
                "--no-progress",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\": \"snap1\""));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_operation_start_without_wait_prints_reference() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/snapshots/old"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/operations/del1", server.uri())),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_with_profile(&dir, &server.uri());

    tokio::task::spawn_blocking(move || {
        rmctl()
            .args([
                "--config-file",
                &config,
                "operation",
                "start",
                "--method",
                "delete",
                "--target",
                "/snapshots/old",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("/operations/del1"))
            .stderr(predicate::str::contains("rmctl operation wait"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resource_exists_reports_absent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/groups/missing"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config_with_profile(&dir, &server.uri());

    tokio::task::spawn_blocking(move || {
        rmctl()
            .args([
                "--config-file",
                &config,
                "resource",
                "exists",
                "/groups/missing",
                "--forbidden-means-absent",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"exists\": false"));
    })
    .await
    .unwrap();
}
