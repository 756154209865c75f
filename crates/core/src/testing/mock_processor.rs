//! Mock video processor for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcode::{
    MediaSnapshot, ProcessRequest, Rotation, TranscodeError, VideoMetadata, VideoProcessingResult,
    VideoProcessor,
};

/// Mock implementation of the VideoProcessor trait.
///
/// Provides controllable behavior for testing:
/// - Track processed requests for assertions
/// - Simulate success/failure
/// - Simulate long runs (for queueing and cancellation)
/// - Control metadata results
#[derive(Debug, Clone, Default)]
pub struct MockVideoProcessor {
    /// Requests that ran to completion.
    processed: Arc<RwLock<Vec<ProcessRequest>>>,
    /// If set, every run fails with this message.
    fail_with: Arc<RwLock<Option<String>>>,
    /// Simulated run duration.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Metadata returned by `get_metadata`, by path.
    metadata: Arc<RwLock<HashMap<PathBuf, VideoMetadata>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl MockVideoProcessor {
    /// Create a new mock processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run fail with `message`.
    pub async fn set_fail_with(&self, message: &str) {
        *self.fail_with.write().await = Some(message.to_string());
    }

    /// Set the simulated run duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Set the metadata returned for `path`.
    pub async fn set_metadata(&self, path: impl AsRef<Path>, metadata: VideoMetadata) {
        self.metadata
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), metadata);
    }

    /// Requests that ran to completion, in completion order.
    pub async fn processed_requests(&self) -> Vec<ProcessRequest> {
        self.processed.read().await.clone()
    }

    /// Highest number of runs observed at the same time.
    pub async fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Metadata for a 1280x720 H.264 encode of a 1920x1080 source.
    pub fn sample_metadata() -> VideoMetadata {
        let original = MediaSnapshot {
            width: 1920,
            height: 1080,
            duration_secs: 12.0,
            size_bytes: 40_000_000,
            format: "mov".to_string(),
            bitrate_kbps: Some(26_000),
            video_codec: "hevc".to_string(),
        };
        let processed = MediaSnapshot {
            width: 1280,
            height: 720,
            size_bytes: 4_000_000,
            format: "mov".to_string(),
            bitrate_kbps: Some(2_500),
            video_codec: "h264".to_string(),
            ..original.clone()
        };
        VideoMetadata::from_snapshots(&original, &processed, Rotation::None, Rotation::None)
    }
}

struct Running(Arc<AtomicUsize>);

impl Drop for Running {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VideoProcessor for MockVideoProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process_video(&self, request: &ProcessRequest) -> VideoProcessingResult {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = Running(self.running.clone());
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.processed.write().await.push(request.clone());

        let elapsed = delay.unwrap_or_default();
        match self.fail_with.read().await.clone() {
            Some(message) => VideoProcessingResult {
                error_message: Some(message),
                ..VideoProcessingResult::failed(
                    self.name(),
                    &TranscodeError::EncodeFailed {
                        stderr: String::new(),
                    },
                    elapsed,
                )
            },
            None => VideoProcessingResult::succeeded(
                self.name(),
                request,
                Self::sample_metadata(),
                elapsed,
            ),
        }
    }

    async fn get_metadata(&self, path: &Path) -> Result<VideoMetadata, TranscodeError> {
        self.metadata
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| TranscodeError::InputNotFound {
                path: path.to_path_buf(),
            })
    }
}
