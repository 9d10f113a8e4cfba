use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::SessionStore;

/// Background task that periodically evicts expired sessions.
///
/// Owned by whoever starts it; [`SessionSweeper::stop`] signals the task and
/// waits for it to finish.
#[derive(Debug)]
pub struct SessionSweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SessionSweeper {
    pub fn start<S: SessionStore>(store: Arc<S>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval_secs = interval.as_secs(), "session sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge_expired().await;
                        if removed > 0 {
                            info!(removed, "expired sessions purged");
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("session sweeper stopped");
        });
        Self { stop_tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "session sweeper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::MemorySessionStore;

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_idle_sessions() {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(30 * 60)));
        store.create().await;
        let sweeper = SessionSweeper::start(Arc::clone(&store), Duration::from_secs(5 * 60));

        tokio::time::sleep(Duration::from_secs(36 * 60)).await;
        assert_eq!(store.len().await, 0);

        sweeper.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_recently_used_sessions() {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(30 * 60)));
        let id = store.create().await.session_id;
        let sweeper = SessionSweeper::start(Arc::clone(&store), Duration::from_secs(5 * 60));

        tokio::time::sleep(Duration::from_secs(25 * 60)).await;
        assert!(store.get(&id).await.is_some());
        tokio::time::sleep(Duration::from_secs(25 * 60)).await;
        assert_eq!(store.len().await, 1);

        sweeper.stop().await;
    }
}
