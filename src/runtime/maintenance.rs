use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::session::SessionStore;

/// Periodically remove stale sessions from `store` until `cancel` fires.
///
/// The first sweep runs one full `interval` after spawning.
pub fn spawn_session_sweeper(
    store: SessionStore,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?interval, "Session sweeper started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.cleanup_stale();
                    debug!(removed, remaining = store.len(), "Session sweep finished");
                }
            }
        }

        info!("Session sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = spawn_session_sweeper(SessionStore::new(), Duration::from_secs(60), cancel.clone());
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_stale_sessions() {
        let store = SessionStore::with_timeout(Duration::from_secs(60));
        let long_ago = Utc::now() - chrono::Duration::hours(1);
        store.update_progress_at("old", None, BTreeMap::new(), Vec::new(), long_ago);
        store.get_or_create("fresh");

        let cancel = CancellationToken::new();
        let handle = spawn_session_sweeper(store.clone(), Duration::from_secs(10), cancel.clone());
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert!(store.session_context("old").is_none());
        assert!(store.session_context("fresh").is_some());

        cancel.cancel();
        handle.await.unwrap();
    }
}
