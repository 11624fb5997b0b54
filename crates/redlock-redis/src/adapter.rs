//! Redis-backed [`StoreAdapter`].
//!
//! Every round-trip follows the same shape: validate the arguments, fetch a
//! pooled connection, race the store call against [`RedisAdapterConfig::call_timeout`],
//! and translate transport failures into [`LockError::Adapter`]. Conditional
//! and multi-key operations are evaluated server-side via the scripts in
//! [`redlock_core::scripts`], cached by SHA1 through [`ScriptCache`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;

use redlock_core::adapter::{AtomicExtendResult, BatchAcquireResult, ExtendResultCode, LockInspection, StoreAdapter};
use redlock_core::{scripts, validate, LockError};

use crate::config::RedisAdapterConfig;
use crate::key_render;
use crate::script_cache::ScriptCache;

/// Redis-backed implementation of [`StoreAdapter`], pooled via `deadpool-redis`.
pub struct RedisAdapter {
    pool: Pool,
    prefix: String,
    call_timeout: Duration,
    scripts: ScriptCache,
}

impl RedisAdapter {
    /// Build a new adapter from `config`. The pool is created eagerly but no
    /// connection is established until first use.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Configuration`] if the pool builder rejects the
    /// configured URL or pool size.
    pub fn new(config: &RedisAdapterConfig) -> Result<Self, LockError> {
        let cfg = Config::from_url(config.effective_url());
        let pool = cfg
            .builder()
            .map_err(|e| LockError::Configuration(e.to_string()))?
            .max_size(config.pool_size)
            .wait_timeout(Some(config.connection_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| LockError::Configuration(e.to_string()))?;

        Ok(Self {
            pool,
            prefix: config.prefix.clone(),
            call_timeout: config.call_timeout,
            scripts: ScriptCache::new(),
        })
    }

    /// Number of Lua scripts currently cached as loaded on the store. Exposed
    /// for tests that assert on script-cache behavior.
    #[must_use]
    pub fn cached_script_count(&self) -> usize {
        self.scripts.cached_script_count()
    }

    fn full_key(&self, key: &str) -> String {
        key_render::apply_prefix(&self.prefix, key)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Adapter(format!("failed to acquire connection: {e}")))
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T, LockError>>) -> Result<T, LockError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LockError::Timeout(self.call_timeout)),
        }
    }
}

#[async_trait]
impl StoreAdapter for RedisAdapter {
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        validate::ttl_ms(ttl_ms)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let result: Option<String> = redis::cmd("SET")
                .arg(&full_key)
                .arg(value)
                .arg("PX")
                .arg(ttl_ms)
                .arg("NX")
                .query_async(&mut conn)
                .await
                .map_err(|e| LockError::Adapter(e.to_string()))?;
            Ok(result.is_some())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        validate::key(key)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.get(&full_key).await.map_err(|e| LockError::Adapter(e.to_string()))
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<u64, LockError> {
        validate::key(key)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            conn.del(&full_key).await.map_err(|e| LockError::Adapter(e.to_string()))
        })
        .await
    }

    async fn delete_if_match(&self, key: &str, value: &str) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let result: i64 = self
                .scripts
                .eval(
                    &mut conn,
                    scripts::names::CONDITIONAL_DELETE,
                    scripts::CONDITIONAL_DELETE,
                    &[full_key.clone()],
                    &[value.to_string()],
                )
                .await?;
            Ok(result == 1)
        })
        .await
    }

    async fn extend_if_match(&self, key: &str, value: &str, ttl_ms: i64) -> Result<bool, LockError> {
        validate::key(key)?;
        validate::value(value)?;
        validate::ttl_ms(ttl_ms)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let result: i64 = self
                .scripts
                .eval(
                    &mut conn,
                    scripts::names::CONDITIONAL_EXTEND,
                    scripts::CONDITIONAL_EXTEND,
                    &[full_key.clone()],
                    &[value.to_string(), ttl_ms.to_string()],
                )
                .await?;
            Ok(result == 1)
        })
        .await
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
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let (code, actual_ttl_ms): (i64, i64) = self
                .scripts
                .eval(
                    &mut conn,
                    scripts::names::ATOMIC_EXTEND,
                    scripts::ATOMIC_EXTEND,
                    &[full_key.clone()],
                    &[
                        value.to_string(),
                        min_remaining_ttl_ms.to_string(),
                        new_ttl_ms.to_string(),
                    ],
                )
                .await?;

            let result_code = match code {
                1 => ExtendResultCode::Success,
                0 => ExtendResultCode::TooLate,
                _ => ExtendResultCode::MismatchOrMissing,
            };
            Ok(AtomicExtendResult {
                result_code,
                actual_ttl_ms,
            })
        })
        .await
    }

    async fn batch_set_if_absent(
        &self,
        keys: &[String],
        values: &[String],
        ttl_ms: i64,
    ) -> Result<BatchAcquireResult, LockError> {
        validate::batch(keys, values)?;
        validate::ttl_ms(ttl_ms)?;
        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        let mut args: Vec<String> = values.to_vec();
        args.push(ttl_ms.to_string());

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let reply: Vec<redis::Value> = self
                .scripts
                .eval(
                    &mut conn,
                    scripts::names::BATCH_SET_IF_ABSENT,
                    scripts::BATCH_SET_IF_ABSENT,
                    &full_keys,
                    &args,
                )
                .await?;

            match reply.first() {
                Some(redis::Value::Int(1)) => {
                    let acquired_count = keys.len();
                    Ok(BatchAcquireResult::Success { acquired_count })
                }
                Some(redis::Value::Int(0)) => {
                    let failed_index = match reply.get(1) {
                        Some(redis::Value::Int(i)) => usize::try_from(*i).unwrap_or(0),
                        _ => 0,
                    };
                    let failed_key_rendered = match reply.get(2) {
                        Some(redis::Value::BulkString(bytes)) => String::from_utf8_lossy(bytes).to_string(),
                        Some(redis::Value::SimpleString(s)) => s.clone(),
                        _ => String::new(),
                    };
                    let failed_key = key_render::strip_prefix(&self.prefix, &failed_key_rendered);
                    Ok(BatchAcquireResult::Failure { failed_index, failed_key })
                }
                other => Err(LockError::Adapter(format!(
                    "unexpected batch_set_if_absent reply: {other:?}"
                ))),
            }
        })
        .await
    }

    async fn inspect(&self, key: &str) -> Result<Option<LockInspection>, LockError> {
        validate::key(key)?;
        let full_key = self.full_key(key);

        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let reply: Option<(String, i64)> = self
                .scripts
                .eval(
                    &mut conn,
                    scripts::names::INSPECT,
                    scripts::INSPECT,
                    &[full_key.clone()],
                    &[],
                )
                .await?;
            Ok(reply.map(|(value, ttl_ms)| LockInspection { value, ttl_ms }))
        })
        .await
    }

    async fn ping(&self) -> Result<(), LockError> {
        self.with_timeout(async {
            let mut conn = self.conn().await?;
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| LockError::Adapter(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn is_connected(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn disconnect(&self) {
        self.scripts.clear();
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> RedisAdapterConfig {
        RedisAdapterConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("redlock-test-{}", redlock_core::token::generate()),
            ..RedisAdapterConfig::default()
        }
    }

    #[tokio::test]
    async fn adapter_conformance() {
        let config = test_config();
        let adapter = RedisAdapter::new(&config).expect("pool creation should succeed");
        redlock_core::testing::run_adapter_conformance_tests(&adapter)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn reloads_script_after_flush() {
        let config = test_config();
        let adapter = RedisAdapter::new(&config).expect("pool creation should succeed");
        let key = format!("reload-{}", redlock_core::token::generate());
        adapter.set_if_absent(&key, "owner", 30_000).await.unwrap();
        assert!(adapter.cached_script_count() == 0, "no script evaluated yet");

        assert!(adapter.delete_if_match(&key, "owner").await.unwrap());
        assert!(adapter.cached_script_count() >= 1);

        let mut conn = adapter.conn().await.unwrap();
        let _: () = redis::cmd("SCRIPT").arg("FLUSH").query_async(&mut conn).await.unwrap();
        drop(conn);

        adapter.set_if_absent(&key, "owner", 30_000).await.unwrap();
        assert!(adapter.delete_if_match(&key, "owner").await.unwrap());
    }
}
