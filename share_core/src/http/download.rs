//! Download serving: stream a stored file back to the client.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::error::ShareError;

/// `GET /files/{name}` - stream one file with a save-as hint. The body is
/// forwarded chunk by chunk, so file size never bounds server memory.
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ShareError> {
    let (file, size) = state.storage.open_file(&name).await?;

    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    // Quotes in a name would break the header value
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "_"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    tracing::info!("serving {:?} ({} bytes)", name, size);

    let stream = ReaderStream::new(file);
    Ok((StatusCode::OK, headers, axum::body::Body::from_stream(stream)).into_response())
}
