//! Probe-only endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vidingest_core::{TranscodeError, VideoMetadata};

use super::paths::confine;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MetadataBody {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct MetadataErrorResponse {
    pub error: String,
}

/// Describe a file under the input root as it is, without processing it
pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MetadataBody>,
) -> Result<Json<VideoMetadata>, impl IntoResponse> {
    let path = match confine(&state.config().storage.input_root, &body.path, "path").await {
        Ok(path) => path,
        Err(e) => {
            return Err((
                e.status(),
                Json(MetadataErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    };

    match state.processor().get_metadata(&path).await {
        Ok(metadata) => Ok(Json(metadata)),
        Err(e) => {
            let status = match e {
                TranscodeError::InputNotFound { .. } => StatusCode::NOT_FOUND,
                TranscodeError::NoVideoStream { .. } | TranscodeError::ProbeFailed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(MetadataErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
