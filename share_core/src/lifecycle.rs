//! Server lifecycle: bind, serve, drain, stop.
//!
//! The [`Lifecycle`] handle is cloned into the shared state, so the shutdown
//! endpoint reaches the same token the serve loop waits on. The stopping
//! transition is terminal; a stopped server is never restarted in place.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ShareConfig;
use crate::error::ShareError;
use crate::http::{self, AppState};
use crate::pairing;
use crate::progress::ProgressRegistry;
use crate::storage::Storage;

/// How long in-flight requests may keep draining after shutdown fires.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared running/stopping switch. Clones observe the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    shutdown: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip to stopping. Calling again is harmless; the first call wins.
    pub fn trigger_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until shutdown has been triggered.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await;
    }
}

/// A bound, ready-to-run file-exchange server.
pub struct ShareServer {
    listener: TcpListener,
    state: Arc<AppState>,
    local_addr: SocketAddr,
}

impl ShareServer {
    /// Bind the listener and assemble the shared state. A port that cannot
    /// be acquired is fatal to startup and reported as [`ShareError::Bind`].
    pub async fn bind(config: &ShareConfig, storage: Storage) -> Result<Self, ShareError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ShareError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ShareError::Bind { addr, source })?;

        let state = Arc::new(AppState {
            storage,
            progress: ProgressRegistry::new(),
            lifecycle: Lifecycle::new(),
            share_url: pairing::share_url(local_addr.port()),
        });

        Ok(Self {
            listener,
            state,
            local_addr,
        })
    }

    /// Address the listener actually bound; port 0 resolves here.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL other devices on the network should open.
    pub fn share_url(&self) -> &str {
        &self.state.share_url
    }

    /// Handle that stops this server when triggered.
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle.clone()
    }

    /// Serve until a lifecycle handle fires, then let in-flight requests
    /// drain for at most [`SHUTDOWN_GRACE`] before dropping what remains.
    pub async fn run(self) -> Result<(), ShareError> {
        let lifecycle = self.state.lifecycle.clone();
        let router = http::create_router(self.state);

        tracing::info!("serving on http://{}", self.local_addr);

        let drain = lifecycle.clone();
        let serve = axum::serve(self.listener, router).with_graceful_shutdown(async move {
            drain.stopped().await;
            tracing::info!("stopping: draining in-flight requests");
        });

        tokio::select! {
            result = serve => {
                result.map_err(|e| ShareError::Internal(format!("server error: {e}")))?;
            }
            _ = async {
                lifecycle.stopped().await;
                tokio::time::sleep(SHUTDOWN_GRACE).await;
            } => {
                tracing::warn!("drain grace elapsed; dropping remaining connections");
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}
