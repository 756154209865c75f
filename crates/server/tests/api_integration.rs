//! Router tests for health, config, codecs, metadata and metrics.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture};
use vidingest_core::testing::MockVideoProcessor;

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["backend"], "mock");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_config_returns_effective_values() {
    let fixture = TestFixture::with_config(TestConfig::serial()).await;

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["jobs"]["max_parallel_jobs"], 1);
    assert_eq!(response.body["transcoder"]["backend"], "direct_process");
    assert_eq!(response.body["processing"]["max_width"], 1280);
    assert_eq!(response.body["processing"]["preferred_video_codec"], "libx264");
}

#[tokio::test]
async fn test_codecs_lists_encoders_once() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/codecs").await;
    assert_status!(response, StatusCode::OK);

    let video: Vec<&str> = response.body["video"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(video.contains(&"libx264"));
    assert!(video.contains(&"mpeg4"));
    assert_eq!(response.body["selected_video_codec"], "libx264");
    assert_eq!(response.body["selected_audio_codec"], "aac");

    // Second call is served from the cache.
    fixture.get("/api/v1/codecs").await;
    assert_eq!(fixture.runner.calls_matching("-encoders").await.len(), 1);
}

#[tokio::test]
async fn test_codecs_refresh_reprobes() {
    let fixture = TestFixture::new().await;

    fixture.get("/api/v1/codecs").await;
    let response = fixture.post_empty("/api/v1/codecs/refresh").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(fixture.runner.calls_matching("-encoders").await.len(), 2);
}

#[tokio::test]
async fn test_codecs_unavailable_when_probe_fails() {
    let fixture = TestFixture::with_config(TestConfig::with_broken_ffmpeg()).await;

    let response = fixture.get("/api/v1/codecs").await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("Could not list encoders"));

    // Failures are not cached: the next request probes again.
    fixture.get("/api/v1/codecs").await;
    assert_eq!(fixture.runner.calls_matching("-encoders").await.len(), 2);
}

#[tokio::test]
async fn test_metadata_for_known_file() {
    let fixture = TestFixture::new().await;
    let path = fixture.input_root.join("clip.mov");
    fixture
        .processor
        .set_metadata(&path, MockVideoProcessor::sample_metadata())
        .await;

    let response = fixture
        .post("/api/v1/metadata", json!({ "path": "clip.mov" }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["original_width"], 1920);
    assert_eq!(response.body["processed_width"], 1280);
    assert_eq!(response.body["processed_rotation"], 0);
}

#[tokio::test]
async fn test_metadata_for_missing_file() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/metadata", json!({ "path": "missing.mov" }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains(&fixture.input_path("missing.mov")));
}

#[tokio::test]
async fn test_metadata_rejects_paths_outside_input_root() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post("/api/v1/metadata", json!({ "path": "../media/clip.mp4" }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post("/api/v1/metadata", json!({ "path": "/etc/passwd" }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("path must be inside"));
}

#[tokio::test]
async fn test_metadata_rejects_empty_path() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/metadata", json!({ "path": "  " })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metadata_rejects_malformed_json() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/api/v1/metadata", "{ not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;

    fixture.get("/api/v1/health").await;
    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("# TYPE"));
    assert!(response.text.contains("vidingest_http_requests_total"));
    assert!(response.text.contains("vidingest_jobs_by_status"));
}

#[tokio::test]
async fn test_unknown_route() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
