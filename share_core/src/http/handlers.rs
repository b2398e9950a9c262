//! Handlers for listing, deletion, progress polling, pairing and shutdown.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::AppState;
use crate::error::ShareError;
use crate::pairing;
use crate::progress::ProgressReport;
use crate::storage::SharedFile;

/// `GET /api/files` - snapshot of the storage root.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SharedFile>>, ShareError> {
    let files = state.storage.list().await?;
    Ok(Json(files))
}

/// `DELETE /api/files/{name}` - remove one file. Repeating the call is
/// harmless; `deleted` reports whether this request did the removing.
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ShareError> {
    let deleted = state.storage.delete(&name).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// `GET /api/progress/{id}` - report for an in-flight upload session.
/// Unknown ids answer 404; clients read that as finished or never started.
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProgressReport>, ShareError> {
    match state.progress.snapshot(&id).await {
        Some(report) => Ok(Json(report)),
        None => Err(ShareError::NotFound(format!("session {id}"))),
    }
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub url: String,
    pub host: String,
    pub folder: String,
}

/// `GET /api/info` - connection details shown in the page header.
pub async fn info_handler(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    let host = hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "Unknown-PC".to_string());
    let folder = state
        .storage
        .root()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Json(ServerInfo {
        url: state.share_url.clone(),
        host,
        folder,
    })
}

/// `GET /qr.png` - the share URL as a scannable code.
pub async fn qr_handler(State(state): State<Arc<AppState>>) -> Result<Response, ShareError> {
    let png = pairing::qr_png(&state.share_url)
        .map_err(|e| ShareError::Internal(format!("QR render failed: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// `POST /api/shutdown` - acknowledge, then stop the server. The response
/// still reaches the caller because shutdown drains in-flight requests.
pub async fn shutdown_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    tracing::info!("shutdown requested over HTTP");
    state.lifecycle.trigger_shutdown();
    Json(json!({ "stopping": true }))
}
