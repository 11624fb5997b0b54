//! The capability [`crate::scoped::run`] needs from a lock type: acquire,
//! release, and produce a [`Renewer`] bound to a specific handle.

use std::sync::Arc;

use async_trait::async_trait;

use redlock_core::LockHandle;
use redlock_core::LockError;

use crate::scheduler::Renewer;

#[async_trait]
pub trait ManagedLock: Send + Sync {
    async fn acquire_handle(&self) -> Result<LockHandle, LockError>;
    async fn release_handle(&self, handle: &LockHandle) -> Result<bool, LockError>;
    fn renewer(self: &Arc<Self>, handle: &LockHandle) -> Arc<dyn Renewer>;
    fn ttl_ms(&self) -> i64;
}
