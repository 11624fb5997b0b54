//! Server-side Lua scripts shared by every [`crate::adapter::StoreAdapter`]
//! implementation. Texts are bit-exact with what the wire protocol expects;
//! do not reformat them casually, backend conformance tests compare against
//! these constants' *behavior*, not their source, but changing whitespace
//! inside a script recomputes its SHA and invalidates adapter script caches
//! mid-rollout.

/// `KEYS[1]` = lock key, `ARGV[1]` = owner value.
///
/// Deletes the key only if its current value matches. Returns 1 if deleted,
/// 0 otherwise.
pub const CONDITIONAL_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
else
  return 0
end
"#;

/// `KEYS[1]` = lock key, `ARGV[1]` = owner value, `ARGV[2]` = new TTL (ms).
///
/// Resets the TTL only if the current value matches. Returns 1 if extended,
/// 0 otherwise.
pub const CONDITIONAL_EXTEND: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// `KEYS[1]` = lock key, `ARGV[1]` = owner value, `ARGV[2]` = minimum
/// remaining TTL (ms), `ARGV[3]` = new TTL (ms).
///
/// Returns a two-element array `{resultCode, actualTTL}`:
/// - `{-1, -2}` if the key is absent.
/// - `{0, r}` if the remaining TTL `r` is below the minimum (too late to
///   safely extend).
/// - `{-1, r}` if the key is held by a different owner.
/// - `{1, r}` on success, after resetting the TTL to `newTtl`.
pub const ATOMIC_EXTEND: &str = r#"
local cur = redis.call("PTTL", KEYS[1])
local minTtl = tonumber(ARGV[2])
local newTtl = tonumber(ARGV[3])
if cur == -2 then
  return {-1, -2}
end
if cur < minTtl then
  return {0, cur}
end
if redis.call("GET", KEYS[1]) == ARGV[1] then
  redis.call("PEXPIRE", KEYS[1], newTtl)
  return {1, cur}
else
  return {-1, cur}
end
"#;

/// `KEYS[1..N]` = lock keys, `ARGV[1..N]` = matching owner values,
/// `ARGV[N+1]` = TTL (ms) applied to every key.
///
/// Phase one checks every key for non-existence; on the first conflict it
/// returns `{0, i, KEYS[i]}` (1-based index) with no mutation. Phase two only
/// runs if every key was free, setting all of them and returning `{1, N}`.
/// Atomicity comes from the store's single-threaded script execution: no
/// other command can interleave between phase one and phase two.
pub const BATCH_SET_IF_ABSENT: &str = r#"
local n = #KEYS
local ttl = tonumber(ARGV[n + 1])
for i = 1, n do
  if redis.call("EXISTS", KEYS[i]) == 1 then
    return {0, i, KEYS[i]}
  end
end
for i = 1, n do
  redis.call("SET", KEYS[i], ARGV[i], "PX", ttl)
end
return {1, n}
"#;

/// `KEYS[1]` = lock key.
///
/// Returns `{value, remainingTtl}` or `nil` if absent.
pub const INSPECT: &str = r#"
local v = redis.call("GET", KEYS[1])
if v == false then
  return nil
end
local ttl = redis.call("PTTL", KEYS[1])
return {v, ttl}
"#;

/// Logical names used to key the per-adapter script-hash cache. Stable
/// across process restarts is not required; the cache is purely in-process.
pub mod names {
    pub const CONDITIONAL_DELETE: &str = "conditional_delete";
    pub const CONDITIONAL_EXTEND: &str = "conditional_extend";
    pub const ATOMIC_EXTEND: &str = "atomic_extend";
    pub const BATCH_SET_IF_ABSENT: &str = "batch_set_if_absent";
    pub const INSPECT: &str = "inspect";
}
