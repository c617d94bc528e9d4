use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16, db_dir: &Path) -> String {
    format!(
        r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"

[accrual]
base_url = "http://127.0.0.1:9"
"#,
        port,
        db_dir.join("loyalty.db").display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Base command with the legacy variables cleared so the host environment
/// cannot leak into the test.
fn server_command(config_path: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_loyalty"));
    command
        .env("LOYALTY_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .env_remove("RUN_ADDRESS")
        .env_remove("DATABASE_URI")
        .env_remove("ACCRUAL_SYSTEM_ADDRESS")
        .env_remove("ACCRUAL_REQUEST_TIMEOUT")
        .kill_on_drop(true);
    command
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, db_dir.path()));

    let mut server = server_command(config.path()).spawn().unwrap();

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, db_dir.path()));

    let mut server = server_command(config.path()).spawn().unwrap();

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let response = Client::new()
        .get(format!("http://127.0.0.1:{}/api/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["auth"]["method"], "none");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["accrual"]["base_url_configured"], true);
    assert!(json["accrual"].get("base_url").is_none());

    server.kill().await.ok();
}

#[tokio::test]
async fn test_legacy_environment_overrides() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(1, db_dir.path()));

    let mut server = server_command(config.path())
        .env("RUN_ADDRESS", format!("127.0.0.1:{}", port))
        .env("ACCRUAL_SYSTEM_ADDRESS", "http://127.0.0.1:10")
        .spawn()
        .unwrap();

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start on RUN_ADDRESS"
    );

    server.kill().await.ok();
}

#[tokio::test]
async fn test_starts_from_environment_without_config_file() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();

    let mut server = server_command(Path::new("/nonexistent/config.toml"))
        .env("RUN_ADDRESS", format!("127.0.0.1:{}", port))
        .env("DATABASE_URI", db_dir.path().join("loyalty.db"))
        .env("ACCRUAL_SYSTEM_ADDRESS", "http://127.0.0.1:9")
        .env("ACCRUAL_REQUEST_TIMEOUT", "2")
        .spawn()
        .unwrap();

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start from environment alone"
    );

    let json: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/config", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(json["accrual"]["base_url_configured"], true);
    assert_eq!(json["accrual"]["request_timeout_secs"], 2);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_without_environment_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        server_command(Path::new("/nonexistent/config.toml")).output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_accrual_section_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080
"#,
    );

    let result = timeout(Duration::from_secs(5), server_command(config.path()).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_accrual_url_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080

[accrual]
base_url = "ftp://accrual.example"
"#,
    );

    let result = timeout(Duration::from_secs(5), server_command(config.path()).output())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[cfg(unix)]
#[tokio::test]
async fn test_sigterm_shuts_down_cleanly() {
    let port = get_available_port();
    let db_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, db_dir.path()));

    let mut server = server_command(config.path()).spawn().unwrap();

    assert!(
        wait_for_server(port, 100).await,
        "Server did not start in time"
    );

    let pid = server.id().expect("server should still be running");
    let kill = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .await
        .expect("Failed to run kill");
    assert!(kill.success());

    let status = timeout(Duration::from_secs(10), server.wait())
        .await
        .expect("Server did not exit after SIGTERM")
        .expect("Failed to wait for server");
    assert!(status.success());
}
