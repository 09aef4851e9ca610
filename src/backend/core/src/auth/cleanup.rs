//! Background purge of expired refresh tokens.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::tokens::TokenService;
use crate::error::Result;
use crate::telemetry::AuthMetrics;

/// Periodically deletes refresh tokens past their expiry.
///
/// Expired tokens are already rejected on redemption; this only keeps the
/// table from growing without bound.
pub struct RefreshTokenCleanup {
    tokens: TokenService,
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl RefreshTokenCleanup {
    pub fn new(tokens: TokenService, interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tokens,
            interval,
            shutdown,
        }
    }

    /// Run one sweep. Returns the number of tokens removed.
    pub async fn run_once(&self) -> Result<u64> {
        let removed = self.tokens.purge_expired().await?;
        AuthMetrics::record_cleanup(removed);
        if removed > 0 {
            info!(removed, "Purged expired refresh tokens");
        } else {
            debug!("No expired refresh tokens to purge");
        }
        Ok(removed)
    }

    /// Spawn the sweep loop. The first sweep runs one interval after start.
    pub fn spawn(self) -> CleanupHandle {
        let shutdown = self.shutdown.clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            warn!(error = %e, "Refresh token cleanup failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Refresh token cleanup stopped");
        });

        CleanupHandle { shutdown, task }
    }
}

/// Handle to a running cleanup loop.
pub struct CleanupHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CleanupHandle {
    /// Signal the loop to stop and wait for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresh token cleanup task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenConfig;
    use crate::db::{MemoryStore, RefreshTokenRecord, Store};
    use crate::rbac::PolicyStore;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn service(store: Arc<MemoryStore>) -> TokenService {
        TokenService::new(
            TokenConfig {
                secret: "cleanup-test-secret-with-32-bytes-min".into(),
                access_ttl: chrono::Duration::minutes(5),
                refresh_ttl: chrono::Duration::minutes(5),
            },
            store.clone(),
            PolicyStore::new(store),
        )
    }

    async fn insert(store: &MemoryStore, user_id: Uuid, offset: chrono::Duration) {
        store
            .insert_refresh_token(&RefreshTokenRecord {
                id: Uuid::new_v4(),
                user_id,
                refresh_token: Uuid::new_v4(),
                expires_at: Utc::now() + offset,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_once_removes_only_expired() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        insert(&store, user_id, chrono::Duration::minutes(-10)).await;
        insert(&store, user_id, chrono::Duration::minutes(-1)).await;
        insert(&store, user_id, chrono::Duration::minutes(10)).await;

        let cleanup = RefreshTokenCleanup::new(service(store.clone()), Duration::from_secs(60));
        assert_eq!(cleanup.run_once().await.unwrap(), 2);
        assert_eq!(store.refresh_token_count(user_id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_sweeps_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        insert(&store, user_id, chrono::Duration::minutes(-1)).await;

        let handle =
            RefreshTokenCleanup::new(service(store.clone()), Duration::from_secs(30)).spawn();
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.refresh_token_count(user_id), 0);
        handle.shutdown().await;
    }
}
