//! Error taxonomy shared by every request handler.
//!
//! Each variant except [`ShareError::Bind`] describes a per-request failure
//! and maps onto one HTTP status; `Bind` is fatal and only ever surfaces
//! from server startup.

use std::net::SocketAddr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    /// The client-supplied name is not a plain file name directly inside
    /// the storage root.
    #[error("invalid file name: {0:?}")]
    InvalidPath(String),

    /// No regular file with this name exists in the storage root.
    #[error("file not found: {0:?}")]
    NotFound(String),

    /// Disk or stream failure while ingesting an upload. Partial data has
    /// already been cleaned up by the time this is returned.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// The upload body exceeds the per-request cap.
    #[error("payload too large (limit is {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    /// Unexpected server-side failure outside the upload write path.
    #[error("internal error: {0}")]
    Internal(String),

    /// The listener could not be bound at startup.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl ShareError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShareError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            ShareError::NotFound(_) => StatusCode::NOT_FOUND,
            ShareError::UploadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ShareError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ShareError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ShareError::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
