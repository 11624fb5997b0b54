//! Redis backend for the Redlock distributed-lock service.
//!
//! [`RedisAdapter`] implements `redlock_core::StoreAdapter` over a pooled
//! `deadpool-redis` connection, evaluating the shared conditional/atomic Lua
//! scripts with a per-instance SHA cache. A [`QuorumLock`](../redlock/struct.QuorumLock.html)
//! fans multiple `RedisAdapter`s out across independent Redis deployments;
//! a single adapter is enough for [`SingleNodeLock`](../redlock/struct.SingleNodeLock.html).

pub mod adapter;
pub mod config;
pub mod key_render;
pub mod script_cache;

pub use adapter::RedisAdapter;
pub use config::RedisAdapterConfig;
