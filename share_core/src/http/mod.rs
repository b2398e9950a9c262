//! HTTP surface of the file-exchange server.
//!
//! | Route                  | Method | Purpose                            |
//! |------------------------|--------|------------------------------------|
//! | `/`                    | GET    | Drag-and-drop page                 |
//! | `/qr.png`              | GET    | Pairing code for the share URL     |
//! | `/api/info`            | GET    | Share URL, host name, folder name  |
//! | `/api/files`           | GET    | List stored files                  |
//! | `/api/files/{name}`    | DELETE | Remove one file                    |
//! | `/api/upload`          | POST   | Multipart upload (`?session=<id>`) |
//! | `/api/progress/{id}`   | GET    | Poll an in-flight upload           |
//! | `/files/{name}`        | GET    | Download one file                  |
//! | `/api/shutdown`        | POST   | Stop the server                    |
//!
//! Everything else falls through to the 404 page.

pub mod download;
pub mod handlers;
pub mod upload;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, Response},
    routing::{delete, get, post},
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::lifecycle::Lifecycle;
use crate::progress::ProgressRegistry;
use crate::storage::Storage;

/// Hard per-request upload cap: 16 GiB of file payload.
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024 * 1024;

/// Allowance on top of the cap for multipart framing overhead.
const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

/// Static HTML content for the web interface
const INDEX_HTML: &str = include_str!("static/index.html");

/// Static HTML content for the 404 page
const NOT_FOUND_HTML: &str = include_str!("static/404.html");

/// State shared by every handler.
pub struct AppState {
    pub storage: Storage,
    pub progress: ProgressRegistry,
    pub lifecycle: Lifecycle,
    /// URL other devices should open, advertised on the page and in the QR.
    pub share_url: String,
}

/// Handler for the root route - serves the main web interface
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Handler for invalid routes - serves 404 page
async fn not_found_handler() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML))
}

/// Middleware to add security headers
async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self' 'unsafe-inline'; connect-src 'self'; img-src 'self' data:;",
        ),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

/// Build the axum router over the shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/qr.png", get(handlers::qr_handler))
        .route("/api/info", get(handlers::info_handler))
        .route("/api/files", get(handlers::list_handler))
        .route("/api/files/{name}", delete(handlers::delete_handler))
        .route(
            "/api/upload",
            post(upload::upload_handler)
                // The axum default (2 MB) is useless for a file drop box;
                // the real cap is enforced in the write loop, with the
                // tower-http layer as the transport backstop.
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(
                    (MAX_UPLOAD_BYTES + BODY_LIMIT_SLACK) as usize,
                )),
        )
        .route("/api/progress/{id}", get(handlers::progress_handler))
        .route("/files/{name}", get(download::download_handler))
        .route("/api/shutdown", post(handlers::shutdown_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn(add_security_headers))
        .with_state(state)
}
