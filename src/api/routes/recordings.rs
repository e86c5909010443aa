//! Recording retrieval and deletion.
//!
//! Provides HTTP endpoints for:
//! - Downloading a recording (GET /api/recordings/:fname)
//! - Deleting a recording (DELETE /api/recordings/:fname/delete)

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/recordings/:fname", get(download_recording))
        .route("/api/recordings/:fname/delete", delete(delete_recording))
        .with_state(state)
}

/// Resolve `fname` inside the record directory, keeping only its final
/// component. Returns the safe name and the path if it is an existing file.
async fn locate(state: &AppState, fname: &str) -> Option<(String, PathBuf)> {
    let safe = std::path::Path::new(fname)
        .file_name()?
        .to_string_lossy()
        .to_string();
    let path = state.record_dir.join(&safe);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Some((safe, path)),
        _ => None,
    }
}

async fn download_recording(
    State(state): State<AppState>,
    Path(fname): Path<String>,
) -> ApiResult<Response> {
    let (safe, path) = locate(&state, &fname)
        .await
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    let file = tokio::fs::File::open(&path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", safe),
            ),
        ],
        body,
    )
        .into_response())
}

async fn delete_recording(
    State(state): State<AppState>,
    Path(fname): Path<String>,
) -> ApiResult<Json<Value>> {
    let (safe, path) = locate(&state, &fname)
        .await
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("Failed to delete {:?}: {}", path, e);
        return Err(ApiError::internal(e.to_string()));
    }

    info!("Deleted recording {}", safe);
    Ok(Json(json!({
        "status": "deleted",
        "filename": safe,
    })))
}
