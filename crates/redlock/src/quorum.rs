//! Quorum lock (Redlock): concurrent fan-out across N adapters, drift-adjusted
//! validity, best-effort cleanup of phantom locks.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use redlock_core::adapter::StoreAdapter;
use redlock_core::handle::{AcquireMetadata, LockHandle, Strategy};
use redlock_core::{token, validate, LockError};

use crate::config::QuorumLockConfig;
use crate::managed::ManagedLock;
use crate::scheduler::{self, CancellationSignal, Renewer};

/// Redlock quorum lock over `N` independent [`StoreAdapter`]s.
pub struct QuorumLock {
    adapters: Vec<Arc<dyn StoreAdapter>>,
    config: QuorumLockConfig,
    quorum: usize,
}

impl QuorumLock {
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if `adapters` is empty, the key
    /// or TTL are invalid, the resolved quorum is outside `[1, N]`, or the
    /// clock-drift factor is outside `[0, 1)`.
    pub fn new(adapters: Vec<Arc<dyn StoreAdapter>>, config: QuorumLockConfig) -> Result<Self, LockError> {
        if adapters.is_empty() {
            return Err(LockError::Configuration(
                "quorum lock requires at least one adapter".to_string(),
            ));
        }
        validate::key(&config.key).map_err(|e| LockError::Configuration(e.to_string()))?;
        validate::ttl_ms(config.ttl_ms).map_err(|e| LockError::Configuration(e.to_string()))?;

        let n = adapters.len();
        let quorum = config.quorum.unwrap_or(n / 2 + 1);
        if quorum == 0 || quorum > n {
            return Err(LockError::Configuration(format!(
                "quorum {quorum} out of range for {n} adapters"
            )));
        }
        if !(0.0..1.0).contains(&config.clock_drift_factor) {
            return Err(LockError::Configuration(
                "clock drift factor must be in [0, 1)".to_string(),
            ));
        }

        Ok(Self { adapters, config, quorum })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.config.key
    }

    #[must_use]
    pub fn ttl_ms(&self) -> i64 {
        self.config.ttl_ms
    }

    #[must_use]
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    fn drift_ms(&self) -> i64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let scaled = (self.config.ttl_ms as f64 * self.config.clock_drift_factor).floor() as i64;
        scaled + 2
    }

    pub async fn acquire(&self) -> Result<LockHandle, LockError> {
        let total_attempts = self.config.retry_attempts + 1;
        let mut last_cause = None;

        for attempt in 1..=total_attempts {
            let value = token::generate();
            let start = Instant::now();

            let outcomes = join_all(self.adapters.iter().enumerate().map(|(index, adapter)| {
                let value = value.clone();
                let key = self.config.key.clone();
                let ttl_ms = self.config.ttl_ms;
                async move { (index, adapter.set_if_absent(&key, &value, ttl_ms).await) }
            }))
            .await;

            let successful: Vec<usize> = outcomes
                .into_iter()
                .filter_map(|(index, result)| result.unwrap_or(false).then_some(index))
                .collect();

            let elapsed = start.elapsed();
            let drift = self.drift_ms();
            let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);

            if successful.len() >= self.quorum && elapsed_ms + drift < self.config.ttl_ms {
                debug!(
                    key = %self.config.key,
                    attempt,
                    nodes = successful.len(),
                    quorum = self.quorum,
                    "quorum lock acquired"
                );
                let nodes = successful.iter().map(ToString::to_string).collect();
                let metadata = AcquireMetadata {
                    attempts: attempt,
                    acquisition_duration: elapsed,
                    nodes,
                    strategy: Strategy::Redlock,
                };
                return Ok(LockHandle::new(self.config.key.clone(), value, self.config.ttl_ms, metadata));
            }

            warn!(
                key = %self.config.key,
                attempt,
                nodes = successful.len(),
                quorum = self.quorum,
                elapsed_ms,
                drift_ms = drift,
                "quorum not met, cleaning up phantom locks"
            );
            self.cleanup_phantom_locks(&successful, &value);

            last_cause = Some(format!(
                "quorum not met: {}/{} nodes succeeded (need {}), elapsed {elapsed_ms}ms + drift {drift}ms vs ttl {}ms",
                successful.len(),
                self.adapters.len(),
                self.quorum,
                self.config.ttl_ms
            ));

            if attempt < total_attempts {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }

        warn!(key = %self.config.key, attempts = total_attempts, "quorum lock unavailable");
        Err(LockError::Unavailable { attempts: total_attempts, last_cause })
    }

    /// Best-effort `deleteIfMatch` against every node that accepted the
    /// rejected attempt. Failures are ignored: this is cleanup of a phantom
    /// lock, not a correctness requirement.
    fn cleanup_phantom_locks(&self, successful: &[usize], value: &str) {
        for &index in successful {
            let adapter = Arc::clone(&self.adapters[index]);
            let key = self.config.key.clone();
            let value = value.to_string();
            tokio::spawn(async move {
                let _ = adapter.delete_if_match(&key, &value).await;
            });
        }
    }

    /// # Errors
    ///
    /// Returns [`LockError::Validation`] if `handle.key` does not match this
    /// lock's key.
    pub async fn release(&self, handle: &LockHandle) -> Result<bool, LockError> {
        self.validate_handle(handle)?;

        let results = join_all(self.adapters.iter().map(|adapter| {
            let key = handle.key.clone();
            let value = handle.value.clone();
            async move { adapter.delete_if_match(&key, &value).await.unwrap_or(false) }
        }))
        .await;

        Ok(results.into_iter().filter(|ok| *ok).count() >= self.quorum)
    }

    /// # Errors
    ///
    /// Returns [`LockError::Validation`] if `handle.key` does not match this
    /// lock's key or `new_ttl_ms` is invalid.
    pub async fn extend(&self, handle: &LockHandle, new_ttl_ms: i64) -> Result<bool, LockError> {
        self.validate_handle(handle)?;
        validate::ttl_ms(new_ttl_ms)?;

        let gets = join_all(self.adapters.iter().map(|adapter| {
            let key = handle.key.clone();
            async move { adapter.get(&key).await.unwrap_or(None) }
        }))
        .await;

        let agreeing = gets
            .iter()
            .filter(|current| {
                current
                    .as_deref()
                    .is_some_and(|cur| bool::from(cur.as_bytes().ct_eq(handle.value.as_bytes())))
            })
            .count();

        if agreeing < self.quorum {
            return Ok(false);
        }

        let results = join_all(self.adapters.iter().map(|adapter| {
            let key = handle.key.clone();
            let value = handle.value.clone();
            async move { adapter.extend_if_match(&key, &value, new_ttl_ms).await.unwrap_or(false) }
        }))
        .await;

        Ok(results.into_iter().filter(|ok| *ok).count() >= self.quorum)
    }

    /// True iff at least `quorum` nodes report a non-null value. Transport
    /// errors count as absent.
    pub async fn is_locked(&self, key: &str) -> bool {
        let gets = join_all(self.adapters.iter().map(|adapter| {
            let key = key.to_string();
            async move { adapter.get(&key).await.unwrap_or(None) }
        }))
        .await;

        gets.iter().filter(|v| v.is_some()).count() >= self.quorum
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

struct QuorumRenewer {
    adapters: Vec<Arc<dyn StoreAdapter>>,
    handle: LockHandle,
    ttl_ms: i64,
    quorum: usize,
}

#[async_trait]
impl Renewer for QuorumRenewer {
    async fn renew(&self) -> Result<bool, LockError> {
        let min_ttl = scheduler::min_remaining_ttl_ms(self.ttl_ms, scheduler::DISTRIBUTED_BUFFER_RATIO);

        let results = join_all(self.adapters.iter().map(|adapter| {
            let key = self.handle.key.clone();
            let value = self.handle.value.clone();
            let new_ttl = self.ttl_ms;
            async move { adapter.atomic_extend(&key, &value, min_ttl, new_ttl).await }
        }))
        .await;

        let successes = results
            .iter()
            .filter(|r| r.as_ref().is_ok_and(|res| res.succeeded()))
            .count();
        Ok(successes >= self.quorum)
    }
}

#[async_trait]
impl ManagedLock for QuorumLock {
    async fn acquire_handle(&self) -> Result<LockHandle, LockError> {
        self.acquire().await
    }

    async fn release_handle(&self, handle: &LockHandle) -> Result<bool, LockError> {
        self.release(handle).await
    }

    fn renewer(self: &Arc<Self>, handle: &LockHandle) -> Arc<dyn Renewer> {
        Arc::new(QuorumRenewer {
            adapters: self.adapters.clone(),
            handle: handle.clone(),
            ttl_ms: self.config.ttl_ms,
            quorum: self.quorum,
        })
    }

    fn ttl_ms(&self) -> i64 {
        self.config.ttl_ms
    }
}

impl QuorumLock {
    /// Scoped execution over the quorum lock: see
    /// [`crate::SingleNodeLock::using`] for the contract.
    ///
    /// # Errors
    ///
    /// See [`crate::SingleNodeLock::using`].
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

    fn adapters(n: usize) -> Vec<Arc<dyn StoreAdapter>> {
        (0..n).map(|_| Arc::new(MemoryAdapter::new()) as Arc<dyn StoreAdapter>).collect()
    }

    #[tokio::test]
    async fn s5_quorum_success_with_one_dead_node() {
        struct DeadAdapter;

        #[async_trait]
        impl StoreAdapter for DeadAdapter {
            async fn set_if_absent(&self, _: &str, _: &str, _: i64) -> Result<bool, LockError> {
                Err(LockError::Timeout(Duration::from_millis(1)))
            }
            async fn get(&self, _: &str) -> Result<Option<String>, LockError> {
                Ok(None)
            }
            async fn delete(&self, _: &str) -> Result<u64, LockError> {
                Ok(0)
            }
            async fn delete_if_match(&self, _: &str, _: &str) -> Result<bool, LockError> {
                Ok(false)
            }
            async fn extend_if_match(&self, _: &str, _: &str, _: i64) -> Result<bool, LockError> {
                Ok(false)
            }
            async fn atomic_extend(
                &self,
                _: &str,
                _: &str,
                _: i64,
                _: i64,
            ) -> Result<redlock_core::adapter::AtomicExtendResult, LockError> {
                Err(LockError::Timeout(Duration::from_millis(1)))
            }
            async fn batch_set_if_absent(
                &self,
                _: &[String],
                _: &[String],
                _: i64,
            ) -> Result<redlock_core::adapter::BatchAcquireResult, LockError> {
                Err(LockError::Timeout(Duration::from_millis(1)))
            }
            async fn inspect(&self, _: &str) -> Result<Option<redlock_core::adapter::LockInspection>, LockError> {
                Ok(None)
            }
            async fn ping(&self) -> Result<(), LockError> {
                Err(LockError::Timeout(Duration::from_millis(1)))
            }
            async fn is_connected(&self) -> bool {
                false
            }
            async fn disconnect(&self) {}
        }

        let mut nodes = adapters(4);
        nodes.insert(2, Arc::new(DeadAdapter));

        let config = QuorumLockConfig::new("s5");
        let lock = QuorumLock::new(nodes, config).unwrap();
        assert_eq!(lock.quorum(), 3);

        let handle = lock.acquire().await.unwrap();
        assert_eq!(handle.metadata.nodes.len(), 4);
    }

    #[tokio::test]
    async fn s6_quorum_fails_and_cleans_up_phantom_locks() {
        let nodes = adapters(5);
        let mut config = QuorumLockConfig::new("s6");
        config.quorum = Some(4);
        let lock = QuorumLock::new(nodes.clone(), config).unwrap();

        // Pre-seed three of five so only two can accept the next attempt,
        // falling below quorum=4 and forcing cleanup on those two.
        for adapter in &nodes[0..3] {
            adapter.set_if_absent("s6", "pre-held", 30_000).await.unwrap();
        }

        let err = lock.acquire().await.unwrap_err();
        assert!(err.is_unavailable());

        tokio::time::sleep(Duration::from_millis(20)).await;
        for adapter in &nodes[3..5] {
            assert!(adapter.get("s6").await.unwrap().is_none(), "phantom lock should be cleaned up");
        }
    }

    #[tokio::test]
    async fn release_requires_quorum_agreement() {
        let nodes = adapters(3);
        let config = QuorumLockConfig::new("release-quorum");
        let lock = QuorumLock::new(nodes, config).unwrap();

        let handle = lock.acquire().await.unwrap();
        assert!(lock.release(&handle).await.unwrap());
        assert!(!lock.is_locked("release-quorum").await);
    }
}
