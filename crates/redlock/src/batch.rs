//! Atomic multi-key acquisition and matched release.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use redlock_core::adapter::{BatchAcquireResult, StoreAdapter};
use redlock_core::handle::{AcquireMetadata, LockHandle, Strategy};
use redlock_core::{token, validate, LockError};

use crate::config::BatchManagerConfig;
use crate::scheduler::{self, CancellationSignal, Renewer, Scheduler};

/// Acquires multiple keys against one adapter atomically: either every key
/// is set, or none are.
pub struct BatchManager {
    adapter: Arc<dyn StoreAdapter>,
    ttl_ms: i64,
}

impl BatchManager {
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if `config.ttl_ms` is invalid.
    pub fn new(adapter: Arc<dyn StoreAdapter>, config: BatchManagerConfig) -> Result<Self, LockError> {
        validate::ttl_ms(config.ttl_ms).map_err(|e| LockError::Configuration(e.to_string()))?;
        Ok(Self { adapter, ttl_ms: config.ttl_ms })
    }

    #[must_use]
    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Sorts `keys` ascending to give a stable global acquisition order
    /// across callers, mints one fencing token per key, and issues a single
    /// atomic `batchSetIfAbsent`. Returned handles are in sorted-key order,
    /// not the caller's original order.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Validation`] if `keys` is empty, or
    /// [`LockError::Unavailable`] naming the conflicting key and its 1-based
    /// index if any key was already held.
    pub async fn acquire_batch(&self, keys: &[String]) -> Result<Vec<LockHandle>, LockError> {
        if keys.is_empty() {
            return Err(LockError::Validation("batch keys must not be empty".to_string()));
        }

        let mut sorted_keys = keys.to_vec();
        sorted_keys.sort();

        let values: Vec<String> = sorted_keys.iter().map(|_| token::generate()).collect();
        let start = Instant::now();

        let result = self
            .adapter
            .batch_set_if_absent(&sorted_keys, &values, self.ttl_ms)
            .await?;

        match result {
            BatchAcquireResult::Success { acquired_count } => {
                debug_assert_eq!(acquired_count, sorted_keys.len());
                debug!(keys = acquired_count, "batch lock acquired");
                let acquisition_duration = start.elapsed();
                let mut handles = Vec::with_capacity(sorted_keys.len());
                for (key, value) in sorted_keys.into_iter().zip(values) {
                    let metadata = AcquireMetadata {
                        attempts: 1,
                        acquisition_duration,
                        nodes: Vec::new(),
                        strategy: Strategy::Batch,
                    };
                    handles.push(LockHandle::new(key, value, self.ttl_ms, metadata));
                }
                Ok(handles)
            }
            BatchAcquireResult::Failure { failed_index, failed_key } => {
                warn!(failed_key = %failed_key, failed_index, "batch acquire failed, no locks held");
                Err(LockError::Unavailable {
                    attempts: 1,
                    last_cause: Some(format!("batch key \"{failed_key}\" (index {failed_index}) already held")),
                })
            }
        }
    }

    /// Releases every handle, tolerating individual failures. Returns `true`
    /// only if every release succeeded.
    pub async fn release_batch(&self, handles: &[LockHandle]) -> bool {
        let results = join_all(handles.iter().map(|handle| {
            let key = handle.key.clone();
            let value = handle.value.clone();
            async move { self.adapter.delete_if_match(&key, &value).await.unwrap_or(false) }
        }))
        .await;

        results.into_iter().all(|ok| ok)
    }

    /// Scoped execution over a batch of keys: acquire all, renew every
    /// handle each tick, release all unconditionally. If any handle's
    /// renewal fails, the signal is aborted.
    ///
    /// # Errors
    ///
    /// See [`crate::SingleNodeLock::using`] for the release-error surfacing
    /// contract; here "release failed" means at least one handle's release
    /// call returned `false` or errored.
    pub async fn using_batch<F, Fut, T>(self: &Arc<Self>, keys: &[String], routine: F) -> Result<T, LockError>
    where
        F: FnOnce(CancellationSignal) -> Fut + Send,
        Fut: Future<Output = Result<T, LockError>> + Send,
        T: Send,
    {
        let handles = self.acquire_batch(keys).await?;

        let renewer: Arc<dyn Renewer> = Arc::new(BatchRenewer {
            adapter: Arc::clone(&self.adapter),
            handles: handles.clone(),
            ttl_ms: self.ttl_ms,
        });
        let scheduler = Scheduler::start(renewer, self.ttl_ms);
        let signal = scheduler.signal();

        let routine_result = routine(signal).await;

        scheduler.stop().await;

        let released_cleanly = self.release_batch(&handles).await;

        match (&routine_result, released_cleanly) {
            (Ok(_), false) => {
                return Err(LockError::Release(
                    "one or more batch locks failed to release".to_string(),
                ));
            }
            (Err(_), false) => {
                tracing::warn!("one or more batch locks failed to release after routine error");
            }
            _ => {}
        }

        routine_result
    }
}

struct BatchRenewer {
    adapter: Arc<dyn StoreAdapter>,
    handles: Vec<LockHandle>,
    ttl_ms: i64,
}

#[async_trait]
impl Renewer for BatchRenewer {
    async fn renew(&self) -> Result<bool, LockError> {
        let min_ttl = scheduler::min_remaining_ttl_ms(self.ttl_ms, scheduler::SINGLE_NODE_BUFFER_RATIO);

        let results = join_all(self.handles.iter().map(|handle| {
            let key = handle.key.clone();
            let value = handle.value.clone();
            let new_ttl = self.ttl_ms;
            async move { self.adapter.atomic_extend(&key, &value, min_ttl, new_ttl).await }
        }))
        .await;

        Ok(results.iter().all(|r| r.as_ref().is_ok_and(|res| res.succeeded())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redlock_memory::MemoryAdapter;
    use std::time::Duration;

    fn manager(ttl_ms: i64) -> (Arc<BatchManager>, Arc<dyn StoreAdapter>) {
        let adapter: Arc<dyn StoreAdapter> = Arc::new(MemoryAdapter::new());
        let config = BatchManagerConfig { ttl_ms };
        (Arc::new(BatchManager::new(Arc::clone(&adapter), config).unwrap()), adapter)
    }

    #[tokio::test]
    async fn s9_batch_success() {
        let (mgr, adapter) = manager(10_000);
        let keys = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let handles = mgr.acquire_batch(&keys).await.unwrap();

        assert_eq!(handles.len(), 3);
        let values: std::collections::HashSet<_> = handles.iter().map(|h| h.value.clone()).collect();
        assert_eq!(values.len(), 3, "every handle should have a distinct fencing token");

        for key in &keys {
            assert!(adapter.get(key).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn s10_batch_failure_leaves_nothing_held() {
        let (mgr, adapter) = manager(10_000);
        adapter.set_if_absent("B", "preexisting", 10_000).await.unwrap();

        let keys = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let err = mgr.acquire_batch(&keys).await.unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("\"B\""));
        assert!(err.to_string().contains("index 2"));

        assert!(adapter.get("A").await.unwrap().is_none());
        assert!(adapter.get("C").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn release_batch_tolerates_partial_failure() {
        let (mgr, _adapter) = manager(10_000);
        let keys = vec!["X".to_string(), "Y".to_string()];
        let mut handles = mgr.acquire_batch(&keys).await.unwrap();

        // Corrupt one handle's token so its release is rejected.
        handles[0].value = "wrong-token".to_string();

        let all_released = mgr.release_batch(&handles).await;
        assert!(!all_released);
    }

    #[tokio::test(start_paused = true)]
    async fn s7_style_using_batch_auto_extends() {
        let (mgr, adapter) = manager(1_000);
        let keys = vec!["P".to_string(), "Q".to_string()];

        mgr.using_batch(&keys, |_signal| async {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            Ok::<_, LockError>(())
        })
        .await
        .unwrap();

        assert!(adapter.get("P").await.unwrap().is_none());
        assert!(adapter.get("Q").await.unwrap().is_none());
    }
}
