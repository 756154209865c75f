//! Mock media prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transcode::{MediaProber, RawContainerInfo, TranscodeError};

/// Mock implementation of the MediaProber trait.
///
/// Inputs are usually registered by path. Encoder outputs land on staged
/// paths that are not known in advance, so unregistered paths fall back to
/// the configured output info; with none configured the probe fails.
#[derive(Debug, Clone, Default)]
pub struct MockMediaProber {
    results: Arc<RwLock<HashMap<PathBuf, RawContainerInfo>>>,
    output_info: Arc<RwLock<Option<RawContainerInfo>>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockMediaProber {
    /// Create a new mock prober.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: RawContainerInfo) {
        self.results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Result for any path without a specific entry.
    pub async fn set_output_info(&self, info: RawContainerInfo) {
        *self.output_info.write().await = Some(info);
    }

    /// Paths probed so far, in order.
    pub async fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl MediaProber for MockMediaProber {
    async fn probe(&self, path: &Path) -> Result<RawContainerInfo, TranscodeError> {
        self.probed.write().await.push(path.to_path_buf());

        if let Some(info) = self.results.read().await.get(path) {
            return Ok(RawContainerInfo {
                path: path.to_path_buf(),
                ..info.clone()
            });
        }

        match self.output_info.read().await.as_ref() {
            Some(info) => Ok(RawContainerInfo {
                path: path.to_path_buf(),
                ..info.clone()
            }),
            None => Err(TranscodeError::probe_failed(format!(
                "ffprobe failed: {}: Invalid data found when processing input",
                path.display()
            ))),
        }
    }
}
