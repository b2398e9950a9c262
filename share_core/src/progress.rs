//! Transient per-upload progress tracking.
//!
//! A session exists only while its upload request is in flight: the upload
//! handler registers one when the client supplies a session id, feeds it as
//! chunks land on disk, and drops it when the request ends either way. Polls
//! for an unknown id answer 404, which a client reads as finished or never
//! started.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Live byte counter for one inbound upload request.
#[derive(Debug)]
pub struct UploadSession {
    received: AtomicU64,
    /// Declared request body length; zero when the client sent none.
    total: u64,
}

impl UploadSession {
    fn new(total: u64) -> Self {
        Self {
            received: AtomicU64::new(0),
            total,
        }
    }

    /// Account for another chunk written to disk.
    pub fn record(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    fn report(&self) -> ProgressReport {
        let received = self.received.load(Ordering::Relaxed);
        let percent = if self.total > 0 {
            (received as f64 / self.total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        ProgressReport {
            received,
            total: self.total,
            percent,
        }
    }
}

/// Point-in-time view of a session, as served to polling clients.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressReport {
    pub received: u64,
    pub total: u64,
    pub percent: f64,
}

/// Registry of in-flight upload sessions, keyed by client-chosen id.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<UploadSession>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for an upload declaring `total` body bytes.
    /// Re-using a live id replaces the stale session.
    pub async fn begin(&self, id: Uuid, total: u64) -> Arc<UploadSession> {
        let session = Arc::new(UploadSession::new(total));
        self.sessions.write().await.insert(id, session.clone());
        session
    }

    /// Report for a session, if it is still in flight.
    pub async fn snapshot(&self, id: &Uuid) -> Option<ProgressReport> {
        self.sessions.read().await.get(id).map(|s| s.report())
    }

    /// Drop a finished or failed session.
    pub async fn finish(&self, id: &Uuid) {
        self.sessions.write().await.remove(id);
    }
}
