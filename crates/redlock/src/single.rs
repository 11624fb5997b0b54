//! Single-node lock: the fast path against one [`StoreAdapter`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use redlock_core::adapter::StoreAdapter;
use redlock_core::handle::{AcquireMetadata, LockHandle, Strategy};
use redlock_core::{token, validate, LockError};

use crate::config::SingleNodeLockConfig;
use crate::managed::ManagedLock;
use crate::scheduler::{self, CancellationSignal, Renewer};

/// Acquire/release/extend against one adapter, with retry and handle
/// minting. Every acquire failure either returns a handle or raises
/// [`LockError::Unavailable`] with `attempts >= 1`; release and extend never
/// retry.
pub struct SingleNodeLock {
    adapter: Arc<dyn StoreAdapter>,
    config: SingleNodeLockConfig,
}

impl SingleNodeLock {
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if `config.key` or `config.ttl_ms`
    /// is invalid.
    pub fn new(adapter: Arc<dyn StoreAdapter>, config: SingleNodeLockConfig) -> Result<Self, LockError> {
        validate::key(&config.key).map_err(|e| LockError::Configuration(e.to_string()))?;
        validate::ttl_ms(config.ttl_ms).map_err(|e| LockError::Configuration(e.to_string()))?;
        Ok(Self { adapter, config })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.config.key
    }

    #[must_use]
    pub fn ttl_ms(&self) -> i64 {
        self.config.ttl_ms
    }

    pub async fn acquire(&self) -> Result<LockHandle, LockError> {
        let value = token::generate();
        let start = Instant::now();
        let mut last_cause = None;
        let total_attempts = self.config.retry_attempts + 1;

        for attempt in 1..=total_attempts {
            match self.adapter.set_if_absent(&self.config.key, &value, self.config.ttl_ms).await {
                Ok(true) => {
                    debug!(key = %self.config.key, attempt, "single-node lock acquired");
                    let metadata = AcquireMetadata {
                        attempts: attempt,
                        acquisition_duration: start.elapsed(),
                        nodes: Vec::new(),
                        strategy: Strategy::Single,
                    };
                    return Ok(LockHandle::new(self.config.key.clone(), value, self.config.ttl_ms, metadata));
                }
                Ok(false) => last_cause = Some("key already held".to_string()),
                Err(err) => {
                    warn!(key = %self.config.key, attempt, error = %err, "single-node acquire attempt failed");
                    last_cause = Some(err.to_string());
                }
            }

            if attempt < total_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        warn!(key = %self.config.key, attempts = total_attempts, "single-node lock unavailable");
        Err(LockError::Unavailable { attempts: total_attempts, last_cause })
    }

    /// # Errors
    ///
    /// Returns [`LockError::Validation`] if `handle.key` does not match this
    /// lock's key, or [`LockError::Release`] on a store/transport failure.
    pub async fn release(&self, handle: &LockHandle) -> Result<bool, LockError> {
        self.validate_handle(handle)?;
        self.adapter
            .delete_if_match(&handle.key, &handle.value)
            .await
            .map_err(|e| LockError::Release(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns [`LockError::Validation`] if `handle.key` does not match this
    /// lock's key or `new_ttl_ms` is invalid, or [`LockError::Extension`] on
    /// a store/transport failure.
    pub async fn extend(&self, handle: &LockHandle, new_ttl_ms: i64) -> Result<bool, LockError> {
        self.validate_handle(handle)?;
        validate::ttl_ms(new_ttl_ms)?;
        self.adapter
            .extend_if_match(&handle.key, &handle.value, new_ttl_ms)
            .await
            .map_err(|e| LockError::Extension(e.to_string()))
    }

    /// True iff `key` is currently held. Transport errors report `false`.
    pub async fn is_locked(&self, key: &str) -> bool {
        self.adapter.get(key).await.map(|v| v.is_some()).unwrap_or(false)
    }

    fn validate_handle(&self, handle: &LockHandle) -> Result<(), LockError> {
        if handle.key != self.config.key {
            return Err(LockError::Validation(
                "handle key does not match this lock's key".to_string(),
            ));
        }
        Ok(())
    }
}

struct SingleNodeRenewer {
    adapter: Arc<dyn StoreAdapter>,
    handle: LockHandle,
    ttl_ms: i64,
}

#[async_trait]
impl Renewer for SingleNodeRenewer {
    async fn renew(&self) -> Result<bool, LockError> {
        let min_ttl = scheduler::min_remaining_ttl_ms(self.ttl_ms, scheduler::SINGLE_NODE_BUFFER_RATIO);
        let result = self
            .adapter
            .atomic_extend(&self.handle.key, &self.handle.value, min_ttl, self.ttl_ms)
            .await?;
        Ok(result.succeeded())
    }
}

#[async_trait]
impl ManagedLock for SingleNodeLock {
    async fn acquire_handle(&self) -> Result<LockHandle, LockError> {
        self.acquire().await
    }

    async fn release_handle(&self, handle: &LockHandle) -> Result<bool, LockError> {
        self.release(handle).await
    }

    fn renewer(self: &Arc<Self>, handle: &LockHandle) -> Arc<dyn Renewer> {
        Arc::new(SingleNodeRenewer {
            adapter: self.adapter.clone(),
            handle: handle.clone(),
            ttl_ms: self.config.ttl_ms,
        })
    }

    fn ttl_ms(&self) -> i64 {
        self.config.ttl_ms
    }
}

impl SingleNodeLock {
    /// Scoped execution: acquire, run `routine(signal)` while a background
    /// scheduler auto-extends the lock, then release unconditionally.
    ///
    /// # Errors
    ///
    /// Propagates `acquire`'s error without running `routine`. Otherwise
    /// returns the routine's own error, or a release error if the routine
    /// succeeded but release failed.
    pub async fn using<F, Fut, T>(self: &Arc<Self>, routine: F) -> Result<T, LockError>
    where
        F: FnOnce(CancellationSignal) -> Fut + Send,
        Fut: Future<Output = Result<T, LockError>> + Send,
        T: Send,
    {
        crate::scoped::run(Arc::clone(self), routine).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redlock_memory::MemoryAdapter;

    fn lock(key: &str, ttl_ms: i64) -> Arc<SingleNodeLock> {
        let adapter: Arc<dyn StoreAdapter> = Arc::new(MemoryAdapter::new());
        let mut config = SingleNodeLockConfig::new(key);
        config.ttl_ms = ttl_ms;
        Arc::new(SingleNodeLock::new(adapter, config).unwrap())
    }

    #[tokio::test]
    async fn s1_happy_path() {
        let l = lock("s1", 5_000);
        let h = l.acquire().await.unwrap();
        assert!(l.is_locked("s1").await);
        assert!(l.extend(&h, 5_000).await.unwrap());
        assert!(l.release(&h).await.unwrap());
        assert!(!l.is_locked("s1").await);
    }

    #[tokio::test]
    async fn s2_contention_reports_two_attempts() {
        let l = lock("s2", 5_000);
        let _h = l.acquire().await.unwrap();

        let mut config = SingleNodeLockConfig::new("s2");
        config.retry_attempts = 1;
        config.retry_delay_ms = 10;
        let contender = SingleNodeLock::new(Arc::clone(&l.adapter), config).unwrap();

        let err = contender.acquire().await.unwrap_err();
        match err {
            LockError::Unavailable { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn release_rejects_handle_from_a_different_key() {
        let l = lock("own-key", 5_000);
        let foreign = LockHandle::new(
            "other-key".into(),
            "v".into(),
            5_000,
            AcquireMetadata {
                attempts: 1,
                acquisition_duration: Duration::from_millis(1),
                nodes: vec![],
                strategy: Strategy::Single,
            },
        );
        assert!(matches!(l.release(&foreign).await, Err(LockError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn scoped_auto_extends_across_a_long_routine() {
        let l = lock("scoped", 1_000);
        let result = l
            .using(|_signal| async {
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                Ok::<_, LockError>(42)
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert!(!l.is_locked("scoped").await);
    }
}
