//! Common test utilities for in-process router tests.
//!
//! This module provides a test fixture that builds the real router around
//! a mock processor and a mock process runner, so every endpoint can be
//! exercised without ffmpeg installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vidingest_core::testing::{MockProcessRunner, MockResponse, MockVideoProcessor};
use vidingest_core::transcode::CapabilityProber;
use vidingest_core::{CodecProbeCache, Config, JobsConfig, ServerConfig, StorageConfig};
use vidingest_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use vidingest_core::testing::fixtures;

/// Test fixture for router tests with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_submission() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/jobs", json!({
///         "input_path": "clip.mov",
///         "output_path": "clip.mp4",
///         "thumbnail_path": "clip.jpg"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock processor - control run results and metadata
    pub processor: Arc<MockVideoProcessor>,
    /// Mock runner behind the capability prober - control `ffmpeg -encoders`
    pub runner: MockProcessRunner,
    /// Scratch directory holding both storage roots
    pub temp_dir: TempDir,
    /// Canonical input root
    pub input_root: PathBuf,
    /// Canonical output root
    pub output_root: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input_root = temp_dir.path().join("uploads");
        let output_root = temp_dir.path().join("media");
        std::fs::create_dir_all(&input_root).expect("Failed to create input root");
        std::fs::create_dir_all(&output_root).expect("Failed to create output root");
        let input_root = input_root.canonicalize().expect("Failed to resolve input root");
        let output_root = output_root.canonicalize().expect("Failed to resolve output root");

        let processor = Arc::new(MockVideoProcessor::new());
        let runner = MockProcessRunner::new();
        let encoders = if test_config.broken_ffmpeg {
            MockResponse::exit_with(1, "ffmpeg: error while loading shared libraries")
        } else {
            MockResponse::ok_stdout(fixtures::ENCODER_LIST)
        };
        runner.on_args_containing("-encoders", encoders).await;

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            jobs: JobsConfig {
                max_parallel_jobs: test_config.max_parallel_jobs,
                ..Default::default()
            },
            storage: StorageConfig {
                input_root: input_root.clone(),
                output_root: output_root.clone(),
            },
            ..Default::default()
        };

        let capabilities = CapabilityProber::new(
            Arc::new(runner.clone()),
            config.transcoder.ffmpeg_path.clone(),
            Arc::new(CodecProbeCache::new()),
        );

        let state = Arc::new(AppState::new(config, processor.clone(), capabilities));
        let router = create_router(state);

        Self {
            router,
            processor,
            runner,
            temp_dir,
            input_root,
            output_root,
        }
    }

    /// Absolute path of `name` under the input root, as the API reports it.
    pub fn input_path(&self, name: &str) -> String {
        self.input_root.join(name).to_string_lossy().into_owned()
    }

    /// Absolute path of `name` under the output root, as the API reports it.
    pub fn output_path(&self, name: &str) -> String {
        self.output_root.join(name).to_string_lossy().into_owned()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }

    /// Polls a job until it reaches `status` or the attempts run out.
    pub async fn wait_for_job_status(&self, id: &str, status: &str) -> TestResponse {
        let path = format!("/api/v1/jobs/{}", id);
        for _ in 0..100 {
            let response = self.get(&path).await;
            if response.body["status"] == status {
                return response;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("job {} never reached status {}", id, status);
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Jobs allowed to run at once
    pub max_parallel_jobs: usize,
    /// Make `ffmpeg -encoders` fail
    pub broken_ffmpeg: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            max_parallel_jobs: 2,
            broken_ffmpeg: false,
        }
    }
}

impl TestConfig {
    /// Config with a single job slot.
    pub fn serial() -> Self {
        Self {
            max_parallel_jobs: 1,
            ..Default::default()
        }
    }

    /// Config whose ffmpeg cannot list encoders.
    pub fn with_broken_ffmpeg() -> Self {
        Self {
            broken_ffmpeg: true,
            ..Default::default()
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
