use async_trait::async_trait;

use crate::error::LockError;

/// Outcome of [`StoreAdapter::atomic_extend`].
///
/// Exactly one of three shapes is ever returned: success with the
/// pre-extension remaining TTL, "too late" with the same, or
/// mismatch-or-missing with either `-2` (absent) or the pre-extension TTL
/// (held by another owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicExtendResult {
    pub result_code: ExtendResultCode,
    /// Remaining TTL (ms) as observed *before* any mutation. `-2` means the
    /// key did not exist at the moment of evaluation.
    pub actual_ttl_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendResultCode {
    Success,
    TooLate,
    MismatchOrMissing,
}

impl AtomicExtendResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.result_code == ExtendResultCode::Success
    }
}

/// Outcome of [`StoreAdapter::batch_set_if_absent`]. Partial success is
/// never reported: either every key was set, or none were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAcquireResult {
    Success { acquired_count: usize },
    Failure { failed_index: usize, failed_key: String },
}

impl BatchAcquireResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, BatchAcquireResult::Success { .. })
    }
}

/// Snapshot returned by [`StoreAdapter::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInspection {
    pub value: String,
    pub ttl_ms: i64,
}

/// Uniform primitive operations against one key-value store.
///
/// Implementations validate arguments per [`crate::validate`] before issuing
/// any store I/O, apply a configured key prefix transparently, and race every
/// round-trip against a per-call timeout.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// `SET key value PX ttl NX`. Returns `true` if the key was newly set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError>;

    /// `GET key`.
    async fn get(&self, key: &str) -> Result<Option<String>, LockError>;

    /// `DEL key`. Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64, LockError>;

    /// Atomic conditional delete via [`crate::scripts::CONDITIONAL_DELETE`].
    async fn delete_if_match(&self, key: &str, value: &str) -> Result<bool, LockError>;

    /// Atomic conditional TTL reset via [`crate::scripts::CONDITIONAL_EXTEND`].
    async fn extend_if_match(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError>;

    /// Atomic extend-with-feedback via [`crate::scripts::ATOMIC_EXTEND`].
    async fn atomic_extend(
        &self,
        key: &str,
        value: &str,
        min_remaining_ttl_ms: i64,
        new_ttl_ms: i64,
    ) -> Result<AtomicExtendResult, LockError>;

    /// Atomic batch set-if-absent via [`crate::scripts::BATCH_SET_IF_ABSENT`].
    /// `keys` and `values` must be equal-length and non-empty; callers are
    /// expected to have validated this already (see [`crate::validate`]).
    async fn batch_set_if_absent(
        &self,
        keys: &[String],
        values: &[String],
        ttl_ms: i64,
    ) -> Result<BatchAcquireResult, LockError>;

    /// Atomic `{value, ttl}` read via [`crate::scripts::INSPECT`].
    async fn inspect(&self, key: &str) -> Result<Option<LockInspection>, LockError>;

    /// Liveness probe; succeeds iff the adapter can reach its backing store.
    async fn ping(&self) -> Result<(), LockError>;

    /// Best-effort connectivity check; transport errors are absorbed as `false`.
    async fn is_connected(&self) -> bool;

    /// Release any held resources (connections, cached script hashes).
    async fn disconnect(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn StoreAdapter) {}

    #[test]
    fn atomic_extend_result_succeeded() {
        let r = AtomicExtendResult {
            result_code: ExtendResultCode::Success,
            actual_ttl_ms: 500,
        };
        assert!(r.succeeded());

        let r = AtomicExtendResult {
            result_code: ExtendResultCode::TooLate,
            actual_ttl_ms: 500,
        };
        assert!(!r.succeeded());
    }

    #[test]
    fn batch_result_is_success() {
        assert!(BatchAcquireResult::Success { acquired_count: 3 }.is_success());
        assert!(!BatchAcquireResult::Failure {
            failed_index: 2,
            failed_key: "b".into()
        }
        .is_success());
    }
}
