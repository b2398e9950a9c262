//! Upload ingestion: multipart file parts streamed to disk.
//!
//! Every part lands in a hidden scratch file first and is renamed onto its
//! final name only once complete, so an interrupted transfer never leaves a
//! truncated file behind and never damages the version it was replacing.

use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::{Field, Multipart};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{AppState, MAX_UPLOAD_BYTES};
use crate::error::ShareError;
use crate::progress::UploadSession;
use crate::storage::SharedFile;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Client-chosen id for progress polling; uploads without one are not
    /// tracked server-side.
    pub session: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct UploadOutcome {
    pub saved: Vec<SharedFile>,
}

/// `POST /api/upload?session=<id>` - ingest multipart file parts.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UploadOutcome>, ShareError> {
    let declared_total = content_length(&headers);

    // A body declared over the cap fails before any disk work
    if let Some(total) = declared_total {
        if total > MAX_UPLOAD_BYTES {
            return Err(ShareError::PayloadTooLarge {
                limit: MAX_UPLOAD_BYTES,
            });
        }
    }

    let tracker = match query.session {
        Some(id) => Some(state.progress.begin(id, declared_total.unwrap_or(0)).await),
        None => None,
    };

    let result = ingest_parts(&state, multipart, tracker.as_deref()).await;

    // Session records are transient; drop them as soon as the request ends
    if let Some(id) = query.session {
        state.progress.finish(&id).await;
    }

    result.map(Json)
}

async fn ingest_parts(
    state: &AppState,
    mut multipart: Multipart,
    tracker: Option<&UploadSession>,
) -> Result<UploadOutcome, ShareError> {
    let mut saved = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(ShareError::UploadFailed(format!(
                    "malformed multipart body: {e}"
                )));
            }
        };

        // Parts without a file name, like empty form inputs, are skipped
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        saved.push(receive_part(state, field, &name, tracker).await?);
    }

    Ok(UploadOutcome { saved })
}

/// Stream one part to a scratch file, then promote it onto its final name.
async fn receive_part(
    state: &AppState,
    mut field: Field<'_>,
    name: &str,
    tracker: Option<&UploadSession>,
) -> Result<SharedFile, ShareError> {
    let target = state.storage.resolve(name)?;

    // Refuse to replace a directory with a file
    if let Ok(meta) = tokio::fs::metadata(&target).await {
        if !meta.is_file() {
            return Err(ShareError::InvalidPath(name.to_string()));
        }
    }

    let scratch = state.storage.scratch_path();
    let written = match stream_to_scratch(&mut field, &scratch, tracker).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&scratch, &target).await {
        let _ = tokio::fs::remove_file(&scratch).await;
        return Err(ShareError::UploadFailed(format!(
            "cannot move {name:?} into place: {e}"
        )));
    }

    tracing::info!("stored {:?} ({} bytes)", name, written);
    Ok(SharedFile {
        name: name.to_string(),
        size: written,
    })
}

/// Copy the part body into `scratch`, flushing before return. Fails with
/// `PayloadTooLarge` as soon as the cap is crossed, without waiting for the
/// rest of the body.
async fn stream_to_scratch(
    field: &mut Field<'_>,
    scratch: &Path,
    tracker: Option<&UploadSession>,
) -> Result<u64, ShareError> {
    let mut file = File::create(scratch)
        .await
        .map_err(|e| ShareError::UploadFailed(format!("cannot create scratch file: {e}")))?;

    let mut written: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            // Covers client disconnects and the transport body limit
            Err(e) => {
                return Err(ShareError::UploadFailed(format!(
                    "upload stream interrupted: {e}"
                )));
            }
        };

        written += chunk.len() as u64;
        if written > MAX_UPLOAD_BYTES {
            return Err(ShareError::PayloadTooLarge {
                limit: MAX_UPLOAD_BYTES,
            });
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| ShareError::UploadFailed(format!("write error: {e}")))?;

        if let Some(tracker) = tracker {
            tracker.record(chunk.len() as u64);
        }
    }

    file.flush()
        .await
        .map_err(|e| ShareError::UploadFailed(format!("flush error: {e}")))?;
    Ok(written)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_content_length_parses_or_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(content_length(&headers), Some(1024));

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("junk"));
        assert_eq!(content_length(&headers), None);
    }
}
