//! Meeting submission endpoint (POST /api/meet).

use axum::{body::Bytes, extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::launcher::LaunchRequest;
use crate::api::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/meet", post(submit_meeting))
        .with_state(state)
}

/// Accepts strings and numbers; blank values count as absent.
fn text_field(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// `true`, `1`, `"yes"` and friends.
fn flag_field(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Queues a bot run for the submitted link.
///
/// # Request Body
/// JSON with `meetlink` (or `link`), optional `message_id` and `headless`.
///
/// # Response
/// 202 with the chosen recording filename and the spawned process id.
async fn submit_meeting(State(state): State<AppState>, body: Bytes) -> ApiResult<(StatusCode, Json<Value>)> {
    let data: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON"))?;

    let link = text_field(data.get("meetlink"))
        .or_else(|| text_field(data.get("link")))
        .unwrap_or_default();
    if !state.is_meet_link(&link) {
        return Err(ApiError::bad_request("Invalid Google Meet link"));
    }

    let message_id = text_field(data.get("message_id"));
    let headless = flag_field(data.get("headless"));
    let filename = format!("rec-{}.mkv", uuid::Uuid::new_v4().simple());

    tokio::fs::create_dir_all(&state.record_dir).await?;

    let request = LaunchRequest {
        meet_link: link.clone(),
        headless,
        output_file: filename.clone(),
        record_dir: state.record_dir.clone(),
        message_id: message_id.clone(),
    };
    let pid = state.launcher.launch(&request).await.map_err(|e| {
        error!("Failed to launch bot: {:#}", e);
        ApiError::from(e)
    })?;

    info!("Queued {} as {} (pid {})", link, filename, pid);
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "queued",
            "pid": pid,
            "meetlink": link,
            "filename": filename,
            "message_id": message_id,
            "file_url": state.file_url(&filename),
        })),
    ))
}
