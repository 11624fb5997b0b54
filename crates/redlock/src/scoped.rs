//! The `using(routine)` scoped-execution pattern: acquire, run the routine
//! with a cancellation signal, guarantee release on every exit path.

use std::future::Future;
use std::sync::Arc;

use redlock_core::LockError;

use crate::managed::ManagedLock;
use crate::scheduler::{CancellationSignal, Scheduler};

/// Acquire `lock`, run `routine(signal)` while a background scheduler keeps
/// the lock alive, and release unconditionally afterwards.
///
/// Release errors are logged (not surfaced) when the routine already failed;
/// if the routine succeeded, a release error is surfaced instead.
pub async fn run<L, F, Fut, T>(lock: Arc<L>, routine: F) -> Result<T, LockError>
where
    L: ManagedLock + 'static,
    F: FnOnce(CancellationSignal) -> Fut + Send,
    Fut: Future<Output = Result<T, LockError>> + Send,
    T: Send,
{
    let handle = lock.acquire_handle().await?;

    let renewer = lock.renewer(&handle);
    let scheduler = Scheduler::start(renewer, lock.ttl_ms());
    let signal = scheduler.signal();

    let routine_result = routine(signal).await;

    scheduler.stop().await;

    let release_result = lock.release_handle(&handle).await;

    match (&routine_result, release_result) {
        (Ok(_), Err(err)) => return Err(err),
        (Err(_), Err(err)) => {
            tracing::warn!(error = %err, key = %handle.key, "lock release failed after routine error");
        }
        _ => {}
    }

    routine_result
}
