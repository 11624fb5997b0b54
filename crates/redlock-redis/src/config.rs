use std::time::Duration;

/// Configuration for the Redis [`crate::RedisAdapter`].
#[derive(Debug, Clone)]
pub struct RedisAdapterConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    ///
    /// Use `rediss://` scheme for TLS connections. When `tls_enabled` is set,
    /// the URL scheme is automatically upgraded to `rediss://`.
    pub url: String,

    /// Key prefix applied to every lock key to avoid collisions with other
    /// users of the same Redis keyspace.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Per-call deadline for a single store round-trip (connection fetch +
    /// command). Exceeding it surfaces as [`redlock_core::LockError::Timeout`].
    pub call_timeout: Duration,

    /// Whether TLS is enabled. When `true`, a `redis://` URL is automatically
    /// upgraded to `rediss://`.
    pub tls_enabled: bool,

    /// Accept invalid certificates (dev/test only). Only meaningful when
    /// using `rediss://` connections.
    pub tls_insecure: bool,
}

impl Default for RedisAdapterConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::from("redlock"),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_millis(5_000),
            tls_enabled: false,
            tls_insecure: false,
        }
    }
}

impl RedisAdapterConfig {
    /// Return the effective connection URL, upgrading to `rediss://` when TLS
    /// is enabled.
    #[must_use]
    pub fn effective_url(&self) -> String {
        if self.tls_enabled && self.url.starts_with("redis://") {
            self.url.replacen("redis://", "rediss://", 1)
        } else {
            self.url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let cfg = RedisAdapterConfig::default();
        assert_eq!(cfg.url, "redis://127.0.0.1:6379");
        assert_eq!(cfg.prefix, "redlock");
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.connection_timeout, Duration::from_secs(5));
        assert_eq!(cfg.call_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn effective_url_upgrades_scheme_when_tls_enabled() {
        let cfg = RedisAdapterConfig {
            tls_enabled: true,
            ..RedisAdapterConfig::default()
        };
        assert_eq!(cfg.effective_url(), "rediss://127.0.0.1:6379");
    }

    #[test]
    fn effective_url_unchanged_without_tls() {
        let cfg = RedisAdapterConfig::default();
        assert_eq!(cfg.effective_url(), cfg.url);
    }
}
