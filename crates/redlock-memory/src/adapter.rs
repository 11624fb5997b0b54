use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use redlock_core::adapter::{AtomicExtendResult, BatchAcquireResult, ExtendResultCode, LockInspection, StoreAdapter};
use redlock_core::{validate, LockError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Remaining TTL in milliseconds, as `PTTL` would report it. Never
    /// negative; an expired entry is evicted rather than reported here.
    fn remaining_ms(&self) -> i64 {
        let now = Instant::now();
        if now >= self.expires_at {
            0
        } else {
            i64::try_from((self.expires_at - now).as_millis()).unwrap_or(i64::MAX)
        }
    }
}

/// In-memory [`StoreAdapter`] backed by a [`DashMap`].
///
/// All mutating operations serialize on an internal mutex, mirroring the
/// single-threaded execution a real store's Lua scripts get for free; this
/// is what makes [`batch_set_if_absent`](StoreAdapter::batch_set_if_absent)
/// atomic across keys here without a multi-key transaction primitive.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: DashMap<String, Entry>,
    guard: Mutex<()>,
}

impl MemoryAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict `key` if present and expired. Returns `true` if an entry
    /// remains (unexpired) after the check.
    fn evict_if_expired(&self, key: &str) -> bool {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl StoreAdapter for MemoryAdapter {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        validate::ttl_ms(ttl_ms)?;
        let _g = self.guard.lock().await;

        self.evict_if_expired(key);
        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: value.to_string(),
                    expires_at: Instant::now() + std::time::Duration::from_millis(ttl_ms as u64),
                });
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        validate::key(key)?;
        self.evict_if_expired(key);
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<u64, LockError> {
        validate::key(key)?;
        let _g = self.guard.lock().await;
        Ok(u64::from(self.entries.remove(key).is_some()))
    }

    async fn delete_if_match(&self, key: &str, value: &str) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        let _g = self.guard.lock().await;

        self.evict_if_expired(key);
        let matched = self.entries.get(key).is_some_and(|e| e.value == value);
        if matched {
            self.entries.remove(key);
        }
        Ok(matched)
    }

    async fn extend_if_match(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        validate::ttl_ms(ttl_ms)?;
        let _g = self.guard.lock().await;

        self.evict_if_expired(key);
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.value == value => {
                entry.expires_at = Instant::now() + std::time::Duration::from_millis(ttl_ms as u64);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn atomic_extend(
        &self,
        key: &str,
        value: &str,
        min_remaining_ttl_ms: i64,
        new_ttl_ms: i64,
    ) -> Result<AtomicExtendResult, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        validate::ttl_ms(new_ttl_ms)?;
        let _g = self.guard.lock().await;

        self.evict_if_expired(key);
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(AtomicExtendResult {
                result_code: ExtendResultCode::MismatchOrMissing,
                actual_ttl_ms: -2,
            });
        };

        let remaining = entry.remaining_ms();
        if remaining < min_remaining_ttl_ms {
            return Ok(AtomicExtendResult {
                result_code: ExtendResultCode::TooLate,
                actual_ttl_ms: remaining,
            });
        }

        if entry.value != value {
            return Ok(AtomicExtendResult {
                result_code: ExtendResultCode::MismatchOrMissing,
                actual_ttl_ms: remaining,
            });
        }

        entry.expires_at = Instant::now() + std::time::Duration::from_millis(new_ttl_ms as u64);
        Ok(AtomicExtendResult {
            result_code: ExtendResultCode::Success,
            actual_ttl_ms: remaining,
        })
    }

    async fn batch_set_if_absent(
        &self,
        keys: &[String],
        values: &[String],
        ttl_ms: i64,
    ) -> Result<BatchAcquireResult, LockError> {
        validate::batch(keys, values)?;
        validate::ttl_ms(ttl_ms)?;
        let _g = self.guard.lock().await;

        for (i, key) in keys.iter().enumerate() {
            if self.evict_if_expired(key) {
                return Ok(BatchAcquireResult::Failure {
                    failed_index: i + 1,
                    failed_key: key.clone(),
                });
            }
        }

        let expires_at = Instant::now() + std::time::Duration::from_millis(ttl_ms as u64);
        for (key, value) in keys.iter().zip(values.iter()) {
            self.entries.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(BatchAcquireResult::Success { acquired_count: keys.len() })
    }

    async fn inspect(&self, key: &str) -> Result<Option<LockInspection>, LockError> {
        validate::key(key)?;
        self.evict_if_expired(key);
        Ok(self.entries.get(key).map(|e| LockInspection {
            value: e.value.clone(),
            ttl_ms: e.remaining_ms(),
        }))
    }

    async fn ping(&self) -> Result<(), LockError> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn disconnect(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conformance() {
        let adapter = MemoryAdapter::new();
        redlock_core::testing::run_adapter_conformance_tests(&adapter)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_lazily() {
        let adapter = MemoryAdapter::new();
        assert!(adapter.set_if_absent("k", "v", 1_000).await.unwrap());

        tokio::time::advance(std::time::Duration::from_millis(1_500)).await;

        assert!(adapter.get("k").await.unwrap().is_none());
        assert!(adapter.set_if_absent("k", "v2", 1_000).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn atomic_extend_reports_too_late_branch() {
        let adapter = MemoryAdapter::new();
        adapter.set_if_absent("k", "v", 500).await.unwrap();
        tokio::time::advance(std::time::Duration::from_millis(400)).await;

        let result = adapter.atomic_extend("k", "v", 200, 30_000).await.unwrap();
        assert_eq!(result.result_code, ExtendResultCode::TooLate);
        assert!(result.actual_ttl_ms > 0 && result.actual_ttl_ms <= 100);
    }

    #[tokio::test]
    async fn disconnect_clears_all_entries() {
        let adapter = MemoryAdapter::new();
        adapter.set_if_absent("k", "v", 10_000).await.unwrap();
        adapter.disconnect().await;
        assert!(adapter.get("k").await.unwrap().is_none());
    }
}
