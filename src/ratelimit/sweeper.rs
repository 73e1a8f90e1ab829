//! Periodic cleanup of stored counter records.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::store::StateStore;
use crate::error::StoreError;

/// Background task that wipes every stored record once per interval.
///
/// Each cycle lists all keys and deletes them one by one, regardless of
/// their count or block state. A failed listing skips the cycle; a failed
/// delete is logged and the cycle moves on to the next key.
pub struct CleanupSweeper {
    interval: Duration,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupSweeper {
    /// Start the sweeper on the current tokio runtime.
    ///
    /// The first cycle runs one full `interval` after the call.
    pub fn spawn(store: Arc<dyn StateStore>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(interval_ms = interval.as_millis() as u64, "Starting cleanup sweeper");
        let handle = tokio::spawn(run(store, interval, shutdown_rx));

        Self {
            interval,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// The configured sweep period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single sweep cycle against `store`.
    ///
    /// Returns the number of keys deleted, or the listing error that aborted
    /// the cycle.
    pub async fn sweep_once(store: &dyn StateStore) -> Result<usize, StoreError> {
        let keys = store.list_keys().await?;

        let mut deleted = 0;
        for key in &keys {
            match store.delete(key).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(key = %key, error = %e, "Cleanup failed to delete key"),
            }
        }

        Ok(deleted)
    }

    /// Stop the sweeper and wait for its task to exit.
    ///
    /// An in-flight cycle is abandoned, not completed. Calling this more than
    /// once is harmless.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cleanup sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for CleanupSweeper {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run(store: Arc<dyn StateStore>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut shutdown_rx) => break,
            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = cancelled(&mut shutdown_rx) => break,
                    result = CleanupSweeper::sweep_once(store.as_ref()) => match result {
                        Ok(deleted) => debug!(deleted, "Cleanup cycle completed"),
                        Err(e) => warn!(error = %e, "Cleanup failed to list keys"),
                    },
                }
            }
        }
    }

    info!("Cleanup sweeper stopped");
}

/// Resolves once shutdown is requested or the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::CounterRecord;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    /// Store whose listing or deletes can be made to fail.
    struct FlakyStore {
        inner: MemoryStore,
        fail_list: bool,
        fail_delete_of: Option<String>,
    }

    #[async_trait]
    impl StateStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<CounterRecord, StoreError> {
            self.inner.get(key).await
        }

        async fn save(&self, record: &CounterRecord) -> Result<(), StoreError> {
            self.inner.save(record).await
        }

        async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
            if self.fail_list {
                return Err(StoreError::Unavailable("list refused".to_string()));
            }
            self.inner.list_keys().await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_delete_of.as_deref() == Some(key) {
                return Err(StoreError::Unavailable("delete refused".to_string()));
            }
            self.inner.delete(key).await
        }
    }

    /// Store whose deletes park until released.
    struct StalledDeleteStore {
        inner: MemoryStore,
        delete_started: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl StateStore for StalledDeleteStore {
        async fn get(&self, key: &str) -> Result<CounterRecord, StoreError> {
            self.inner.get(key).await
        }

        async fn save(&self, record: &CounterRecord) -> Result<(), StoreError> {
            self.inner.save(record).await
        }

        async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_keys().await
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.delete_started.notify_one();
            self.release.notified().await;
            self.inner.delete(key).await
        }
    }

    async fn populated_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.save(&CounterRecord::new("10.0.0.1")).await.unwrap();
        store
            .save(&CounterRecord {
                key: "10.0.0.2".to_string(),
                count: 7,
                blocked_at: 0,
            })
            .await
            .unwrap();
        store
            .save(&CounterRecord {
                key: "10.0.0.3".to_string(),
                count: 0,
                blocked_at: 1_700_000_000,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_sweep_once_deletes_everything() {
        let store = populated_store().await;

        let deleted = CleanupSweeper::sweep_once(store.as_ref()).await.unwrap();

        assert_eq!(deleted, 3);
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_once_skips_failed_delete() {
        let inner = MemoryStore::new();
        inner.save(&CounterRecord::new("a")).await.unwrap();
        inner.save(&CounterRecord::new("b")).await.unwrap();
        inner.save(&CounterRecord::new("c")).await.unwrap();
        let store = FlakyStore {
            inner,
            fail_list: false,
            fail_delete_of: Some("b".to_string()),
        };

        let deleted = CleanupSweeper::sweep_once(&store).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(store.inner.list_keys().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_sweep_once_aborts_when_listing_fails() {
        let inner = MemoryStore::new();
        inner.save(&CounterRecord::new("a")).await.unwrap();
        let store = FlakyStore {
            inner,
            fail_list: true,
            fail_delete_of: None,
        };

        assert!(CleanupSweeper::sweep_once(&store).await.is_err());
        assert_eq!(store.inner.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_clears_store_after_interval() {
        let store = populated_store().await;
        let sweeper = CleanupSweeper::spawn(store.clone(), Duration::from_secs(10));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.len(), 3, "no cycle before the first interval elapses");

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.len(), 0);

        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_running_after_list_failure() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_list: true,
            fail_delete_of: None,
        });
        let sweeper = CleanupSweeper::spawn(store.clone(), Duration::from_secs(1));

        time::sleep(Duration::from_millis(3500)).await;

        let handle = sweeper.handle.lock().take().unwrap();
        assert!(!handle.is_finished());
        let _ = sweeper.shutdown_tx.send(true);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_future_cycles() {
        let store = populated_store().await;
        let sweeper = CleanupSweeper::spawn(store.clone(), Duration::from_secs(10));

        sweeper.shutdown().await;
        sweeper.shutdown().await;

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_in_flight_cycle() {
        let store = Arc::new(StalledDeleteStore {
            inner: MemoryStore::new(),
            delete_started: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        for key in ["a", "b", "c"] {
            store.inner.save(&CounterRecord::new(key)).await.unwrap();
        }
        let sweeper = CleanupSweeper::spawn(store.clone(), Duration::from_secs(10));

        // Wait until the first cycle is parked inside its first delete.
        store.delete_started.notified().await;

        sweeper.shutdown().await;

        assert!(sweeper.handle.lock().is_none(), "task was joined");
        assert_eq!(store.inner.len(), 3, "no key of the interrupted cycle was deleted");

        // Later releases and ticks have no effect once the task is gone.
        store.release.notify_waiters();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.inner.len(), 3);
    }
}
