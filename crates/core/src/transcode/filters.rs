//! Filter graphs and encoder arguments.
//!
//! Everything here is pure: the backends decide how the pieces are assembled
//! into a command line.

use std::path::Path;

use super::config::RotationMetadataPolicy;
use super::types::{Dimensions, Rotation};

/// Video transform for one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    /// Filters in application order.
    pub filters: Vec<String>,
    /// Size the scaler produces, in pixel orientation.
    pub scale: Dimensions,
    /// Value written to the output's rotation field, `None` to leave it unset.
    pub rotate_metadata: Option<Rotation>,
}

impl FilterSpec {
    /// The `-vf` argument.
    pub fn filter_graph(&self) -> String {
        self.filters.join(",")
    }

    /// `-metadata:s:v:0 rotate=N` when a rotation value is written.
    pub fn metadata_args(&self) -> Vec<String> {
        match self.rotate_metadata {
            Some(rotation) => vec![
                "-metadata:s:v:0".to_string(),
                format!("rotate={}", rotation.degrees()),
            ],
            None => Vec::new(),
        }
    }
}

/// How the decoder treats the input's display matrix.
///
/// With `-noautorotate` ffmpeg copies the input display matrix onto the
/// output stream, so a file can end up signalling a rotation nobody asked
/// for. Each variant closes that path a different way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrientation {
    /// Pixels arrive untouched and the input matrix is replaced by `signal`.
    Override { signal: Rotation },
    /// The decoder turns the pixels by `applied` and the output carries no matrix.
    Autorotate { applied: Rotation },
    /// Pixels arrive untouched and there is no matrix to carry over.
    Raw,
}

impl InputOrientation {
    /// Picks the strategy for an input whose display matrix turns decoded
    /// frames by `decoder_rotation`, when the output should signal `signal`.
    pub fn choose(
        decoder_rotation: Option<Rotation>,
        display_override: bool,
        signal: Rotation,
    ) -> Self {
        match (display_override, decoder_rotation) {
            (true, _) => Self::Override { signal },
            (false, Some(applied)) => Self::Autorotate { applied },
            (false, None) => Self::Raw,
        }
    }

    /// Input options, placed before `-i`.
    pub fn decoder_args(&self) -> Vec<String> {
        match self {
            Self::Override { signal } => vec![
                "-noautorotate".to_string(),
                "-display_rotation:v:0".to_string(),
                signal.degrees().to_string(),
            ],
            Self::Autorotate { .. } => Vec::new(),
            Self::Raw => vec!["-noautorotate".to_string()],
        }
    }

    /// Rotation already present in the frames that reach the filter graph.
    pub fn applied(&self) -> Rotation {
        match self {
            Self::Autorotate { applied } => *applied,
            Self::Override { .. } | Self::Raw => Rotation::None,
        }
    }
}

/// Builds the transform for `rotation` and a display-oriented `target`.
///
/// `applied` is what the decoder already did to the frames; the filters
/// only add the remainder. With `physical_rotation` the frames end up
/// upright, are scaled to `target`, and the rotation field is zeroed.
/// Without it they end up in sensor orientation, are scaled to the
/// pixel-orientation size, and `policy` decides what the rotation field says.
pub fn build_transform(
    rotation: Rotation,
    applied: Rotation,
    target: Dimensions,
    physical_rotation: bool,
    policy: RotationMetadataPolicy,
) -> FilterSpec {
    let wanted = if physical_rotation {
        rotation
    } else {
        Rotation::None
    };
    let mut filters: Vec<String> = rotation_primitive(applied.inverse().then(wanted))
        .iter()
        .map(|f| f.to_string())
        .collect();

    if physical_rotation {
        filters.push(scale_filter(target));
        FilterSpec {
            filters,
            scale: target,
            rotate_metadata: Some(Rotation::None),
        }
    } else {
        let scale = if rotation.swaps_axes() {
            target.transposed()
        } else {
            target
        };
        let rotate_metadata = match policy {
            RotationMetadataPolicy::Preserve => rotation,
            RotationMetadataPolicy::Zero => Rotation::None,
        };
        filters.push(scale_filter(scale));

        FilterSpec {
            filters,
            scale,
            rotate_metadata: Some(rotate_metadata),
        }
    }
}

fn rotation_primitive(rotation: Rotation) -> &'static [&'static str] {
    match rotation {
        Rotation::None => &[],
        Rotation::Cw90 => &["transpose=1"],
        Rotation::Cw180 => &["hflip", "vflip"],
        Rotation::Cw270 => &["transpose=2"],
    }
}

fn scale_filter(target: Dimensions) -> String {
    format!("scale={}:{}", target.width, target.height)
}

/// Encoder family, used to pick profile and level caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    H264,
    Hevc,
    Other,
}

impl CodecFamily {
    pub fn of(codec: &str) -> Self {
        let codec = codec.to_ascii_lowercase();
        if codec.contains("264") {
            Self::H264
        } else if codec.contains("265") || codec.contains("hevc") {
            Self::Hevc
        } else {
            Self::Other
        }
    }
}

/// Pixel format, profile/level cap and rate control for the video encoder.
pub fn video_rate_args(codec: &str, bitrate_kbps: u32) -> Vec<String> {
    let mut args = vec!["-pix_fmt".to_string(), "yuv420p".to_string()];

    match CodecFamily::of(codec) {
        CodecFamily::H264 => {
            args.extend(["-profile:v", "main", "-level:v", "4.0"].map(String::from));
        }
        CodecFamily::Hevc => {
            args.extend(["-profile:v", "main"].map(String::from));
        }
        CodecFamily::Other => {}
    }

    let bitrate = u64::from(bitrate_kbps);
    args.extend([
        "-b:v".to_string(),
        format!("{}k", bitrate),
        "-maxrate".to_string(),
        format!("{}k", bitrate * 2),
        "-bufsize".to_string(),
        format!("{}k", bitrate * 4),
    ]);
    args
}

/// Audio bitrate.
pub fn audio_rate_args(bitrate_kbps: u32) -> Vec<String> {
    vec!["-b:a".to_string(), format!("{}k", bitrate_kbps)]
}

/// Container options derived from the output extension.
pub fn container_args(output: &Path) -> Vec<String> {
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp4" | "mov" | "m4v") => vec!["-movflags".to_string(), "+faststart".to_string()],
        _ => Vec::new(),
    }
}

/// Output options for a single still frame.
pub fn still_frame_args() -> Vec<String> {
    ["-frames:v", "1", "-q:v", "2"].map(String::from).to_vec()
}

/// Seek position in the form ffmpeg expects.
pub fn seek_position(offset_secs: f64) -> String {
    format!("{:.3}", offset_secs.max(0.0))
}
