//! Tests that spawn the real `vidingest` binary.

use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config with storage roots under `data`
fn minimal_config(port: u16, data: &std::path::Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[transcoder]
ffmpeg_path = "/nonexistent/ffmpeg"
ffprobe_path = "/nonexistent/ffprobe"

[storage]
input_root = "{}"
output_root = "{}"
"#,
        port,
        data.join("uploads").display(),
        data.join("media").display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_vidingest"))
        .env("VIDINGEST_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Minimal HTTP/1.1 GET; returns the raw response.
async fn http_get(port: u16, path: &str) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.ok()?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await.ok()?;
    Some(response)
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    for _ in 0..max_attempts {
        if http_get(port, "/api/v1/health").await.is_some() {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let data = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, data.path()));

    let mut server = spawn_server(config.path());
    assert!(wait_for_server(port, 100).await, "Server did not start in time");
    assert!(data.path().join("uploads").is_dir());
    assert!(data.path().join("media").is_dir());

    let response = http_get(port, "/api/v1/health").await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"), "response: {}", response);
    assert!(response.contains(r#""status":"ok""#));
    assert!(response.contains(r#""backend":"direct_process""#));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_codecs_unavailable_without_ffmpeg() {
    let port = get_available_port();
    let data = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, data.path()));

    let mut server = spawn_server(config.path());
    assert!(wait_for_server(port, 100).await, "Server did not start in time");

    let response = http_get(port, "/api/v1/codecs").await.unwrap();
    assert!(response.starts_with("HTTP/1.1 503"), "response: {}", response);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_vidingest"))
            .env("VIDINGEST_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Failed to load config"), "stderr: {}", stderr);
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080

[jobs]
max_parallel_jobs = 0
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_vidingest"))
            .env("VIDINGEST_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("max_parallel_jobs"), "stderr: {}", stderr);
}
