//! Media probing with ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::error::TranscodeError;
use super::process::{path_arg, ProcessRunner};
use super::types::{RawContainerInfo, RawStreamInfo};

/// Reads container and stream information from a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probes `path`. A file without a video stream is not an error here.
    async fn probe(&self, path: &Path) -> Result<RawContainerInfo, TranscodeError>;
}

/// [`MediaProber`] that runs `ffprobe` through a [`ProcessRunner`].
#[derive(Clone)]
pub struct FfprobeProber {
    runner: Arc<dyn ProcessRunner>,
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(runner: Arc<dyn ProcessRunner>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffprobe_path: ffprobe_path.into(),
        }
    }

    fn probe_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .map(OsString::from)
        .to_vec();
        args.push(path_arg(path));
        args
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<RawContainerInfo, TranscodeError> {
        let outcome = self
            .runner
            .run(&self.ffprobe_path, &Self::probe_args(path))
            .await
            .map_err(|e| TranscodeError::probe_failed(e.to_string()))?;

        if !outcome.success() {
            return Err(TranscodeError::probe_failed(format!(
                "ffprobe failed: {}",
                outcome.failure_output()
            )));
        }

        let mut info = parse_probe_output(path, &outcome.stdout)?;
        if info.size_bytes == 0 {
            if let Ok(meta) = tokio::fs::metadata(path).await {
                info.size_bytes = meta.len();
            }
        }

        debug!(
            path = %path.display(),
            format = %info.format_name,
            duration_secs = info.duration_secs,
            has_video = info.video.is_some(),
            "Probed media file"
        );
        Ok(info)
    }
}

/// Parses `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, output: &str) -> Result<RawContainerInfo, TranscodeError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: Option<String>,
        duration: Option<String>,
        bit_rate: Option<String>,
        size: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        duration: Option<String>,
        bit_rate: Option<String>,
        #[serde(default)]
        tags: HashMap<String, String>,
        #[serde(default)]
        side_data_list: Vec<SideData>,
    }

    #[derive(Deserialize)]
    struct SideData {
        side_data_type: Option<String>,
        rotation: Option<serde_json::Value>,
    }

    let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
        TranscodeError::probe_failed(format!("Failed to parse ffprobe output: {}", e))
    })?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| RawStreamInfo {
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            duration_secs: parse_f64(s.duration.as_deref()).unwrap_or(0.0),
            bitrate: parse_u64(s.bit_rate.as_deref()),
            codec_name: s.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
            rotate_tag: s.tags.get("rotate").and_then(|r| r.trim().parse::<i32>().ok()),
            display_matrix_rotation: s
                .side_data_list
                .iter()
                .filter(|d| d.side_data_type.as_deref() == Some("Display Matrix"))
                .find_map(|d| d.rotation.as_ref().and_then(json_number)),
        });

    let audio_codec = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .and_then(|s| s.codec_name.clone());

    let format_name = probe
        .format
        .format_name
        .as_deref()
        .and_then(|f| f.split(',').next())
        .unwrap_or("unknown")
        .to_string();

    Ok(RawContainerInfo {
        path: path.to_path_buf(),
        format_name,
        duration_secs: parse_f64(probe.format.duration.as_deref()).unwrap_or(0.0),
        bitrate: parse_u64(probe.format.bit_rate.as_deref()),
        size_bytes: parse_u64(probe.format.size.as_deref()).unwrap_or(0),
        video,
        audio_codec,
    })
}

fn parse_f64(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse::<u64>().ok())
}

/// Display matrix rotation is a number in current ffprobe builds, a string in some older ones.
fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
