//! Constructor configuration for [`crate::SingleNodeLock`], [`crate::QuorumLock`],
//! and [`crate::BatchManager`], with documented production defaults.

/// Default lock lifetime: 30 seconds.
pub const DEFAULT_TTL_MS: i64 = 30_000;
/// Default number of retry attempts after the first acquire attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default delay between single-node acquire attempts.
pub const DEFAULT_SINGLE_RETRY_DELAY_MS: u64 = 100;
/// Default delay between quorum acquire attempts.
pub const DEFAULT_DISTRIBUTED_RETRY_DELAY_MS: u64 = 200;
/// Default clock-drift factor applied to TTL in the quorum validity check.
pub const DEFAULT_CLOCK_DRIFT_FACTOR: f64 = 0.01;

/// Configuration for [`crate::SingleNodeLock`].
#[derive(Debug, Clone)]
pub struct SingleNodeLockConfig {
    pub key: String,
    pub ttl_ms: i64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl SingleNodeLockConfig {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl_ms: DEFAULT_TTL_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_SINGLE_RETRY_DELAY_MS,
        }
    }
}

/// Configuration for [`crate::QuorumLock`]. `quorum` defaults to `floor(n/2)+1`
/// over the adapter count supplied at construction when left `None`.
#[derive(Debug, Clone)]
pub struct QuorumLockConfig {
    pub key: String,
    pub ttl_ms: i64,
    pub quorum: Option<usize>,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub clock_drift_factor: f64,
}

impl QuorumLockConfig {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl_ms: DEFAULT_TTL_MS,
            quorum: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_DISTRIBUTED_RETRY_DELAY_MS,
            clock_drift_factor: DEFAULT_CLOCK_DRIFT_FACTOR,
        }
    }
}

/// Configuration for [`crate::BatchManager`].
#[derive(Debug, Clone)]
pub struct BatchManagerConfig {
    pub ttl_ms: i64,
}

impl Default for BatchManagerConfig {
    fn default() -> Self {
        Self { ttl_ms: DEFAULT_TTL_MS }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_defaults() {
        let cfg = SingleNodeLockConfig::new("k");
        assert_eq!(cfg.ttl_ms, DEFAULT_TTL_MS);
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.retry_delay_ms, 100);
    }

    #[test]
    fn quorum_defaults() {
        let cfg = QuorumLockConfig::new("k");
        assert!(cfg.quorum.is_none());
        assert_eq!(cfg.retry_delay_ms, 200);
        assert_eq!(cfg.clock_drift_factor, 0.01);
    }

    #[test]
    fn batch_defaults() {
        assert_eq!(BatchManagerConfig::default().ttl_ms, DEFAULT_TTL_MS);
    }
}
