//! Background service that expires idle sessions and their uploads.
//!
//! Each cycle:
//! - drops sessions idle for longer than the session TTL and purges their batches
//! - purges batch directories untouched for the TTL that no live session owns

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use woof_storage::UploadStore;

use crate::metrics;
use crate::session::SessionStore;
use crate::state::AppState;

/// Upload janitor service.
pub struct UploadJanitor {
    uploads: Arc<UploadStore>,
    sessions: Arc<SessionStore>,
    ttl: Duration,
    period: Duration,
}

impl UploadJanitor {
    pub fn new(
        uploads: Arc<UploadStore>,
        sessions: Arc<SessionStore>,
        ttl: Duration,
        period: Duration,
    ) -> Self {
        Self {
            uploads,
            sessions,
            ttl,
            period,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::clone(&state.uploads),
            Arc::clone(&state.sessions),
            state.config.session_ttl,
            state.config.janitor_interval,
        )
    }

    /// Start the cleanup loop.
    ///
    /// This function runs indefinitely and should be spawned as a background task.
    pub async fn run(&self) {
        info!(period = ?self.period, ttl = ?self.ttl, "Starting upload janitor");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Upload janitor error: {:#}", e);
            }
        }
    }

    /// Run a single cleanup cycle. Returns the number of purged batches.
    pub async fn run_once(&self) -> anyhow::Result<usize> {
        let mut purged = 0usize;

        for batch_id in self.sessions.remove_expired(self.ttl).await {
            match self.uploads.purge(&batch_id).await {
                Ok(files) => {
                    if files > 0 {
                        purged += 1;
                    }
                    debug!(batch_id = %batch_id, files, "Expired session");
                }
                Err(e) => warn!(batch_id = %batch_id, error = %e, "Failed to purge expired session"),
            }
        }

        // Batches left behind by sessions this process never saw.
        let live = self.sessions.ids().await;
        let orphans = self
            .uploads
            .purge_expired(self.ttl, |batch_id| live.contains(batch_id))
            .await?;
        purged += orphans.len();

        let active = self.sessions.len().await;
        metrics::set_active_sessions(active);
        if purged > 0 {
            metrics::record_batches_purged("expired", purged);
            info!(batches = purged, active_sessions = active, "Expired upload batches purged");
        }

        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use woof_models::BatchId;

    async fn janitor(ttl: Duration) -> (tempfile::TempDir, UploadJanitor) {
        let dir = tempfile::tempdir().unwrap();
        let uploads = Arc::new(UploadStore::open(dir.path()).await.unwrap());
        let sessions = Arc::new(SessionStore::new());
        let janitor = UploadJanitor::new(uploads, sessions, ttl, Duration::from_secs(60));
        (dir, janitor)
    }

    #[tokio::test]
    async fn test_keeps_fresh_sessions() {
        let (_dir, janitor) = janitor(Duration::from_secs(3600)).await;
        let batch = BatchId::new();
        janitor.sessions.push_url(&batch, "/uploads/x".to_string()).await;
        janitor.uploads.save(&batch, "a.png", b"a").await.unwrap();

        assert_eq!(janitor.run_once().await.unwrap(), 0);
        assert_eq!(janitor.uploads.list(&batch).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purges_expired_sessions_and_orphans() {
        let (_dir, janitor) = janitor(Duration::ZERO).await;
        let owned = BatchId::new();
        let orphan = BatchId::new();
        janitor.sessions.push_url(&owned, "/uploads/a".to_string()).await;
        janitor.uploads.save(&owned, "a.png", b"a").await.unwrap();
        janitor.uploads.save(&orphan, "b.png", b"b").await.unwrap();

        assert_eq!(janitor.run_once().await.unwrap(), 2);
        assert!(janitor.sessions.is_empty().await);
        assert!(janitor.uploads.batches().await.unwrap().is_empty());
    }
}
