use std::time::{Duration, SystemTime};

/// Which acquisition strategy produced a [`LockHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Single,
    Redlock,
    Batch,
}

/// Acquisition diagnostics captured alongside a successful acquire.
#[derive(Debug, Clone)]
pub struct AcquireMetadata {
    /// Number of attempts consumed before success (>= 1).
    pub attempts: u32,
    /// Wall-clock duration of the whole acquire call.
    pub acquisition_duration: Duration,
    /// For [`Strategy::Redlock`], the identifiers of the nodes that accepted
    /// the lock. Empty for single-node and batch strategies.
    pub nodes: Vec<String>,
    pub strategy: Strategy,
}

/// An opaque, per-acquire capability to release or extend exactly one lock
/// instance in the store. Valid only against the lock object that produced
/// it: callers must not pass a handle from one lock instance's `release`/
/// `extend` to a different instance.
///
/// A handle has no lifecycle tied to the lock object — it is a plain value,
/// freely clonable and sendable across tasks, though a single handle must
/// not be used concurrently for both extend and release.
#[derive(Debug, Clone)]
pub struct LockHandle {
    /// Identifier unique per successful acquire; used for diagnostics and
    /// log correlation. Distinct from `value`, which is the fencing token.
    pub id: String,
    /// The store key under which the lock is recorded.
    pub key: String,
    /// The fencing token: an unguessable string minted at acquire time, also
    /// used as the owner-proof on release and extend.
    pub value: String,
    pub acquired_at: SystemTime,
    /// The lifetime requested on the store at acquisition time (ms).
    pub ttl_ms: i64,
    pub metadata: AcquireMetadata,
}

impl LockHandle {
    #[must_use]
    pub fn new(key: String, value: String, ttl_ms: i64, metadata: AcquireMetadata) -> Self {
        Self {
            id: crate::token::generate(),
            key,
            value,
            acquired_at: SystemTime::now(),
            ttl_ms,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_handle_has_distinct_id_and_value() {
        let meta = AcquireMetadata {
            attempts: 1,
            acquisition_duration: Duration::from_millis(5),
            nodes: vec![],
            strategy: Strategy::Single,
        };
        let h = LockHandle::new("k".into(), "v".into(), 30_000, meta);
        assert_ne!(h.id, h.value);
        assert_eq!(h.key, "k");
        assert_eq!(h.ttl_ms, 30_000);
    }
}
