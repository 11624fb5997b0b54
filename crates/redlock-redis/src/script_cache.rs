//! In-process cache of Lua script SHA1 hashes.
//!
//! `SCRIPT LOAD` is only issued the first time a logical script is used; the
//! returned hash is cached under its logical name and reused for `EVALSHA` on
//! every subsequent call. If the store reports `NOSCRIPT` (for example after
//! a `SCRIPT FLUSH` or a failover to a replica that never saw the load), the
//! cached hash is dropped and the script is reloaded exactly once before
//! giving up.

use dashmap::DashMap;
use redis::{FromRedisValue, RedisError};
use tracing::{debug, warn};

use redlock_core::LockError;

pub struct ScriptCache {
    hashes: DashMap<&'static str, String>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
        }
    }

    /// Number of logical scripts currently known to be loaded on the store.
    #[must_use]
    pub fn cached_script_count(&self) -> usize {
        self.hashes.len()
    }

    /// Drop every cached hash, forcing a reload on next use.
    pub fn clear(&self) {
        self.hashes.clear();
    }

    async fn ensure_loaded(
        &self,
        conn: &mut deadpool_redis::Connection,
        name: &'static str,
        body: &str,
    ) -> Result<String, LockError> {
        if let Some(sha) = self.hashes.get(name) {
            return Ok(sha.clone());
        }
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(body)
            .query_async(conn)
            .await
            .map_err(|e| LockError::Adapter(format!("script load failed for {name}: {e}")))?;
        debug!(script = name, sha = %sha, "script loaded");
        self.hashes.insert(name, sha.clone());
        Ok(sha)
    }

    /// Evaluate a logical script against `keys`/`args`, loading (and, on
    /// `NOSCRIPT`, reloading exactly once) as needed.
    pub async fn eval<T>(
        &self,
        conn: &mut deadpool_redis::Connection,
        name: &'static str,
        body: &str,
        keys: &[String],
        args: &[String],
    ) -> Result<T, LockError>
    where
        T: FromRedisValue,
    {
        let sha = self.ensure_loaded(conn, name, body).await?;
        match Self::evalsha(conn, &sha, keys, args).await {
            Ok(value) => Ok(value),
            Err(err) if is_noscript(&err) => {
                warn!(script = name, "NOSCRIPT on evalsha, reloading once");
                self.hashes.remove(name);
                let sha = self.ensure_loaded(conn, name, body).await?;
                Self::evalsha(conn, &sha, keys, args).await.map_err(|err2| {
                    if is_noscript(&err2) {
                        LockError::Adapter(format!("script {name} missing after reload: {err2}"))
                    } else {
                        LockError::Adapter(err2.to_string())
                    }
                })
            }
            Err(err) => Err(LockError::Adapter(err.to_string())),
        }
    }

    async fn evalsha<T>(
        conn: &mut deadpool_redis::Connection,
        sha: &str,
        keys: &[String],
        args: &[String],
    ) -> redis::RedisResult<T>
    where
        T: FromRedisValue,
    {
        let mut cmd = redis::cmd("EVALSHA");
        cmd.arg(sha).arg(keys.len());
        for key in keys {
            cmd.arg(key);
        }
        for arg in args {
            cmd.arg(arg);
        }
        cmd.query_async(conn).await
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new()
    }
}

fn is_noscript(err: &RedisError) -> bool {
    err.code() == Some("NOSCRIPT")
}
