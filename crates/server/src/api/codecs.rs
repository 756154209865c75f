//! Encoder capability endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use vidingest_core::transcode::{CodecKind, SupportedCodecs};

use crate::state::AppState;

/// Encoders the configured ffmpeg reports, and what processing would pick.
#[derive(Debug, Serialize)]
pub struct CodecsResponse {
    pub ffmpeg_path: String,
    pub video: Vec<String>,
    pub audio: Vec<String>,
    pub selected_video_codec: String,
    pub selected_audio_codec: String,
}

#[derive(Debug, Serialize)]
pub struct CodecsErrorResponse {
    pub error: String,
}

async fn describe(state: &AppState, codecs: &SupportedCodecs) -> CodecsResponse {
    let processing = &state.config().processing;
    let capabilities = state.capabilities();

    CodecsResponse {
        ffmpeg_path: state.config().transcoder.ffmpeg_path.display().to_string(),
        video: codecs.video.iter().cloned().collect(),
        audio: codecs.audio.iter().cloned().collect(),
        selected_video_codec: capabilities
            .best_codec(
                CodecKind::Video,
                &processing.preferred_video_codec,
                &processing.video_codec_fallbacks,
            )
            .await,
        selected_audio_codec: capabilities
            .best_codec(
                CodecKind::Audio,
                &processing.preferred_audio_codec,
                &processing.audio_codec_fallbacks,
            )
            .await,
    }
}

fn unavailable(state: &AppState) -> (StatusCode, Json<CodecsErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(CodecsErrorResponse {
            error: format!(
                "Could not list encoders of {}",
                state.config().transcoder.ffmpeg_path.display()
            ),
        }),
    )
}

/// Cached encoder list, probing on first use
pub async fn get_codecs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CodecsResponse>, impl IntoResponse> {
    match state.capabilities().supported().await {
        Some(codecs) => Ok(Json(describe(&state, &codecs).await)),
        None => Err(unavailable(&state)),
    }
}

/// Re-probe the encoder list, e.g. after ffmpeg was upgraded
pub async fn refresh_codecs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CodecsResponse>, impl IntoResponse> {
    match state.capabilities().refresh().await {
        Some(codecs) => {
            info!(
                video = codecs.video.len(),
                audio = codecs.audio.len(),
                "Encoder list refreshed"
            );
            Ok(Json(describe(&state, &codecs).await))
        }
        None => Err(unavailable(&state)),
    }
}
