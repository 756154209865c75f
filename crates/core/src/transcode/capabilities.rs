//! Encoder capability detection and codec selection.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::process::ProcessRunner;
use super::types::CodecKind;
use crate::metrics;

/// One line of `ffmpeg -encoders`: capability flags, then the encoder name.
static ENCODER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([VAS])[A-Z.]{5}\s+(\S+)").unwrap()
});

static GLOBAL_CACHE: Lazy<Arc<CodecProbeCache>> = Lazy::new(|| Arc::new(CodecProbeCache::new()));

/// Encoders and input options reported by one transcoder binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupportedCodecs {
    pub video: BTreeSet<String>,
    pub audio: BTreeSet<String>,
    /// The binary accepts `-display_rotation` to replace an input's display matrix.
    pub display_rotation: bool,
    #[serde(skip)]
    raw: String,
}

impl SupportedCodecs {
    /// Parses `ffmpeg -encoders` output.
    pub fn parse(output: &str) -> Self {
        let mut codecs = Self {
            raw: output.to_string(),
            ..Default::default()
        };

        for line in output.lines() {
            let Some(caps) = ENCODER_LINE.captures(line) else {
                continue;
            };
            let name = &caps[2];
            // Legend lines look like " V..... = Video"
            if name == "=" {
                continue;
            }
            match &caps[1] {
                "V" => {
                    codecs.video.insert(name.to_string());
                }
                "A" => {
                    codecs.audio.insert(name.to_string());
                }
                _ => {}
            }
        }

        codecs
    }

    /// Whether `codec` looks usable for `kind`.
    ///
    /// A parsed-name match or a plain substring hit in the raw output both
    /// count, so unusual output formats err towards permitting the codec.
    pub fn supports(&self, kind: CodecKind, codec: &str) -> bool {
        if codec.is_empty() {
            return false;
        }
        let parsed = match kind {
            CodecKind::Video => &self.video,
            CodecKind::Audio => &self.audio,
        };
        parsed.contains(codec) || self.raw.contains(codec)
    }

    /// Picks the preferred codec, else the first supported fallback.
    ///
    /// Returns `None` when nothing in the list is supported.
    pub fn select(&self, kind: CodecKind, preferred: &str, fallbacks: &[String]) -> Option<String> {
        std::iter::once(preferred)
            .chain(fallbacks.iter().map(String::as_str))
            .find(|codec| self.supports(kind, codec))
            .map(str::to_string)
    }
}

/// Process-wide cache of encoder lists keyed by binary path.
///
/// Snapshots are immutable and swapped whole, so readers see either the old
/// or the new list. Probing is serialised so a binary is queried once even
/// under concurrent first use. Failed probes are not cached.
#[derive(Debug, Default)]
pub struct CodecProbeCache {
    entries: RwLock<HashMap<PathBuf, Arc<SupportedCodecs>>>,
    populate: Mutex<()>,
}

impl CodecProbeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every processor in this process.
    pub fn global() -> Arc<CodecProbeCache> {
        GLOBAL_CACHE.clone()
    }

    /// Snapshot for `binary` if one has been probed.
    pub fn cached(&self, binary: &Path) -> Option<Arc<SupportedCodecs>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(binary)
            .cloned()
    }

    /// Returns the cached snapshot, probing `binary` on first use.
    pub async fn get(
        &self,
        runner: &dyn ProcessRunner,
        binary: &Path,
    ) -> Option<Arc<SupportedCodecs>> {
        if let Some(snapshot) = self.cached(binary) {
            return Some(snapshot);
        }

        let _guard = self.populate.lock().await;
        // Another caller may have populated it while we waited.
        if let Some(snapshot) = self.cached(binary) {
            return Some(snapshot);
        }
        self.probe_and_store(runner, binary).await
    }

    /// Re-probes `binary` and swaps the snapshot.
    ///
    /// On failure the previous snapshot, if any, stays in place.
    pub async fn refresh(
        &self,
        runner: &dyn ProcessRunner,
        binary: &Path,
    ) -> Option<Arc<SupportedCodecs>> {
        let _guard = self.populate.lock().await;
        self.probe_and_store(runner, binary).await
    }

    async fn probe_and_store(
        &self,
        runner: &dyn ProcessRunner,
        binary: &Path,
    ) -> Option<Arc<SupportedCodecs>> {
        let snapshot = Arc::new(probe_encoders(runner, binary).await?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(binary.to_path_buf(), snapshot.clone());
        Some(snapshot)
    }
}

/// Whether `ffmpeg -h long` output lists the `-display_rotation` input option.
pub fn lists_display_rotation(help: &str) -> bool {
    help.lines()
        .any(|line| line.trim_start().starts_with("-display_rotation"))
}

async fn probe_encoders(runner: &dyn ProcessRunner, binary: &Path) -> Option<SupportedCodecs> {
    let args = [OsString::from("-hide_banner"), OsString::from("-encoders")];

    match runner.run(binary, &args).await {
        Ok(outcome) if outcome.success() => {
            let mut codecs = SupportedCodecs::parse(&outcome.stdout);
            codecs.display_rotation = probe_display_rotation(runner, binary).await;
            metrics::CAPABILITY_PROBES.with_label_values(&["success"]).inc();
            info!(
                binary = %binary.display(),
                video = codecs.video.len(),
                audio = codecs.audio.len(),
                display_rotation = codecs.display_rotation,
                "Probed encoder capabilities"
            );
            Some(codecs)
        }
        Ok(outcome) => {
            metrics::CAPABILITY_PROBES.with_label_values(&["failed"]).inc();
            warn!(
                binary = %binary.display(),
                exit_code = ?outcome.exit_code,
                "Encoder capability probe failed: {}",
                outcome.failure_output()
            );
            None
        }
        Err(e) => {
            metrics::CAPABILITY_PROBES.with_label_values(&["failed"]).inc();
            warn!(binary = %binary.display(), error = %e, "Encoder capability probe failed");
            None
        }
    }
}

/// A failed help query only disables the option; the encoder list still counts.
async fn probe_display_rotation(runner: &dyn ProcessRunner, binary: &Path) -> bool {
    let args = [
        OsString::from("-hide_banner"),
        OsString::from("-h"),
        OsString::from("long"),
    ];

    match runner.run(binary, &args).await {
        Ok(outcome) if outcome.success() => lists_display_rotation(&outcome.stdout),
        Ok(outcome) => {
            debug!(exit_code = ?outcome.exit_code, "ffmpeg -h long failed, assuming no -display_rotation");
            false
        }
        Err(e) => {
            debug!(error = %e, "ffmpeg -h long failed, assuming no -display_rotation");
            false
        }
    }
}

/// Chooses codecs for one transcoder binary.
#[derive(Clone)]
pub struct CapabilityProber {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_path: PathBuf,
    cache: Arc<CodecProbeCache>,
}

impl CapabilityProber {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg_path: impl Into<PathBuf>,
        cache: Arc<CodecProbeCache>,
    ) -> Self {
        Self {
            runner,
            ffmpeg_path: ffmpeg_path.into(),
            cache,
        }
    }

    /// Current snapshot, probing on first use.
    pub async fn supported(&self) -> Option<Arc<SupportedCodecs>> {
        self.cache.get(self.runner.as_ref(), &self.ffmpeg_path).await
    }

    /// Whether the binary can override an input's display matrix. `false` when probing failed.
    pub async fn display_rotation(&self) -> bool {
        self.supported()
            .await
            .is_some_and(|supported| supported.display_rotation)
    }

    /// Forces a new probe.
    pub async fn refresh(&self) -> Option<Arc<SupportedCodecs>> {
        self.cache
            .refresh(self.runner.as_ref(), &self.ffmpeg_path)
            .await
    }

    /// Best available codec for `kind`. Never fails.
    ///
    /// Falls back to the first supported entry of `fallbacks`, then to
    /// [`CodecKind::last_resort`].
    pub async fn best_codec(&self, kind: CodecKind, preferred: &str, fallbacks: &[String]) -> String {
        let selected = match self.supported().await {
            Some(supported) => supported.select(kind, preferred, fallbacks),
            None => None,
        };

        match selected {
            Some(codec) => {
                if codec != preferred {
                    info!(kind = kind.as_str(), preferred, selected = %codec, "Using fallback codec");
                } else {
                    debug!(kind = kind.as_str(), codec = %codec, "Using preferred codec");
                }
                codec
            }
            None => {
                let codec = kind.last_resort();
                metrics::CODEC_FALLBACKS
                    .with_label_values(&[kind.as_str()])
                    .inc();
                warn!(
                    kind = kind.as_str(),
                    preferred,
                    ?fallbacks,
                    "No preferred or fallback codec available, using {}",
                    codec
                );
                codec.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProcessRunner, MockResponse};

    const ENCODERS: &str = "Encoders:
 V..... = Video
 A..... = Audio
 S..... = Subtitle
 .F.... = Frame-level multithreading
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D mpeg4                MPEG-4 part 2
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3) (codec mp3)
 S..... srt                  SubRip subtitle
";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_encoder_list() {
        let codecs = SupportedCodecs::parse(ENCODERS);
        assert!(codecs.video.contains("libx264"));
        assert!(codecs.video.contains("mpeg4"));
        assert!(codecs.audio.contains("aac"));
        assert!(codecs.audio.contains("libmp3lame"));
        assert!(!codecs.video.contains("="));
        assert!(!codecs.video.contains("srt"));
        assert_eq!(codecs.video.len(), 2);
    }

    #[test]
    fn test_select_preference_order() {
        let codecs = SupportedCodecs::parse(ENCODERS);
        assert_eq!(
            codecs.select(CodecKind::Video, "libx264", &[]),
            Some("libx264".to_string())
        );
        assert_eq!(
            codecs.select(CodecKind::Video, "libx265", &strings(&["h264_videotoolbox", "mpeg4", "libx264"])),
            Some("mpeg4".to_string())
        );
        assert_eq!(codecs.select(CodecKind::Audio, "libopus", &strings(&["aac_at"])), None);
    }

    #[test]
    fn test_supports_is_permissive_on_raw_output() {
        // Unparseable layout still matches by substring.
        let codecs = SupportedCodecs::parse("encoders: libx264 aac");
        assert!(codecs.video.is_empty());
        assert!(codecs.supports(CodecKind::Video, "libx264"));
        assert!(!codecs.supports(CodecKind::Video, "libvpx"));
        assert!(!codecs.supports(CodecKind::Video, ""));
    }

    #[tokio::test]
    async fn test_best_codec_falls_back_to_last_resort() {
        let runner = Arc::new(MockProcessRunner::new());
        runner.on_args_containing("-encoders", MockResponse::ok_stdout(
            " V....D libx264              H.264\n A....D aac                  AAC\n",
        )).await;
        let prober = CapabilityProber::new(runner, "ffmpeg", Arc::new(CodecProbeCache::new()));

        assert_eq!(prober.best_codec(CodecKind::Video, "h264_pref", &[]).await, "libx264");
        assert_eq!(
            prober.best_codec(CodecKind::Audio, "libopus", &strings(&["aac"])).await,
            "aac"
        );
    }

    #[tokio::test]
    async fn test_probe_runs_once_per_binary() {
        let runner = Arc::new(MockProcessRunner::new());
        runner.on_args_containing("-encoders", MockResponse::ok_stdout(ENCODERS)).await;
        let cache = Arc::new(CodecProbeCache::new());
        let prober = CapabilityProber::new(runner.clone(), "ffmpeg", cache.clone());

        let results = futures::future::join_all(
            (0..8).map(|_| prober.best_codec(CodecKind::Video, "libx264", &[])),
        )
        .await;
        assert!(results.iter().all(|codec| codec == "libx264"));
        // One encoder listing plus one help query.
        assert_eq!(runner.call_count().await, 2);
        assert_eq!(runner.calls_matching("-encoders").await.len(), 1);

        let other = CapabilityProber::new(runner.clone(), "/opt/ffmpeg", cache);
        other.supported().await.unwrap();
        assert_eq!(runner.call_count().await, 4);
    }

    #[test]
    fn test_help_output_lists_display_rotation() {
        let help = "Advanced per-stream options:
-display_rotation[:<stream_spec>] <angle>  set pure counter-clockwise rotation in degrees for stream(s)
-display_hflip[:<stream_spec>]  set display horizontal flip for stream(s)
";
        assert!(lists_display_rotation(help));
        assert!(!lists_display_rotation("-noautorotate      disable automatically rotating video"));
    }

    #[tokio::test]
    async fn test_display_rotation_detection() {
        let runner = Arc::new(MockProcessRunner::new());
        runner.on_args_containing("-encoders", MockResponse::ok_stdout(ENCODERS)).await;
        runner.on_args_containing(
            "long",
            MockResponse::ok_stdout("-display_rotation[:<stream_spec>] <angle>  set rotation\n"),
        ).await;
        let prober = CapabilityProber::new(runner.clone(), "ffmpeg", Arc::new(CodecProbeCache::new()));
        assert!(prober.display_rotation().await);

        // A failing help query keeps the encoder list.
        runner.on_args_containing("long", MockResponse::exit_with(1, "Unrecognized option")).await;
        let refreshed = prober.refresh().await.unwrap();
        assert!(!refreshed.display_rotation);
        assert!(refreshed.video.contains("libx264"));
    }

    #[tokio::test]
    async fn test_failed_probe_is_not_cached() {
        let runner = Arc::new(MockProcessRunner::new());
        runner.on_args_containing("-encoders", MockResponse::exit_with(1, "boom")).await;
        let cache = Arc::new(CodecProbeCache::new());
        let prober = CapabilityProber::new(runner.clone(), "ffmpeg", cache.clone());

        assert_eq!(prober.best_codec(CodecKind::Audio, "libopus", &[]).await, "aac");
        assert!(cache.cached(Path::new("ffmpeg")).is_none());

        runner.on_args_containing("-encoders", MockResponse::ok_stdout(ENCODERS)).await;
        assert_eq!(
            prober.best_codec(CodecKind::Audio, "libmp3lame", &[]).await,
            "libmp3lame"
        );
        assert!(cache.cached(Path::new("ffmpeg")).is_some());
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let runner = Arc::new(MockProcessRunner::new());
        runner.on_args_containing("-encoders", MockResponse::ok_stdout(ENCODERS)).await;
        let prober = CapabilityProber::new(runner.clone(), "ffmpeg", Arc::new(CodecProbeCache::new()));

        let before = prober.supported().await.unwrap();
        assert!(before.video.contains("mpeg4"));

        runner.on_args_containing(
            "-encoders",
            MockResponse::ok_stdout(" V....D libx265              HEVC\n"),
        ).await;
        let after = prober.refresh().await.unwrap();
        assert!(after.video.contains("libx265"));
        assert!(!after.video.contains("mpeg4"));
        // Readers holding the old snapshot keep a consistent view.
        assert!(before.video.contains("mpeg4"));
    }
}
