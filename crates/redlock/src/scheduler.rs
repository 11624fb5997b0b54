//! Single-threaded cooperative auto-extension timer.
//!
//! One [`Scheduler`] runs per active scoped execution. It sleeps until the
//! projected renewal instant, attempts renewal through a [`Renewer`], and
//! either reschedules or publishes failure on the [`CancellationSignal`] it
//! hands back. It never spawns parallel renewal attempts for the same lock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use redlock_core::LockError;

/// Renew when remaining lifetime falls below this fraction of TTL.
pub const THRESHOLD_RATIO: f64 = 0.20;
/// Minimum-remaining-TTL threshold supplied to `atomicExtend` for a
/// single-node lock.
pub const SINGLE_NODE_BUFFER_RATIO: f64 = 0.10;
/// Minimum-remaining-TTL threshold supplied to `atomicExtend` for a quorum
/// lock; smaller than the single-node ratio because fan-out coordination
/// itself consumes time.
pub const DISTRIBUTED_BUFFER_RATIO: f64 = 0.05;
/// Lower bound on the scheduler's tick interval.
pub const MIN_EXTENSION_INTERVAL_MS: i64 = 100;
/// Absolute minimum acceptable remaining TTL; below this, extension is
/// refused as unsafe.
pub const SAFETY_BUFFER_MS: i64 = 2_000;

/// Capability a lock type hands the scheduler: attempt to renew everything it
/// is managing (one handle for single-node/quorum, N handles for a batch),
/// applying that lock type's own buffer ratio and quorum rule.
#[async_trait]
pub trait Renewer: Send + Sync {
    async fn renew(&self) -> Result<bool, LockError>;
}

/// The minimum remaining TTL passed to `atomicExtend`:
/// `max(safetyBuffer, ttl * bufferRatio)`.
#[must_use]
pub fn min_remaining_ttl_ms(ttl_ms: i64, buffer_ratio: f64) -> i64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let scaled = (ttl_ms as f64 * buffer_ratio) as i64;
    scaled.max(SAFETY_BUFFER_MS)
}

fn renewal_interval(ttl_ms: i64) -> Duration {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let proactive = (ttl_ms as f64 * (1.0 - THRESHOLD_RATIO)) as i64;
    Duration::from_millis(u64::try_from(proactive.max(MIN_EXTENSION_INTERVAL_MS)).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Default)]
struct SignalState {
    aborted: bool,
    error: Option<String>,
}

/// Single-shot cancellation token handed to a scoped-execution routine. The
/// routine is expected to check [`aborted`](Self::aborted) at safe points;
/// the scheduler does not force-terminate it.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    state: Arc<Mutex<SignalState>>,
}

impl CancellationSignal {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SignalState::default())),
        }
    }

    /// True once the scheduler has given up on renewal.
    pub async fn aborted(&self) -> bool {
        self.state.lock().await.aborted
    }

    /// The failure message, once the signal has been published.
    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    /// Sets `aborted` and `error` exactly once; later calls are no-ops.
    async fn publish(&self, message: String) {
        let mut state = self.state.lock().await;
        if !state.aborted {
            state.aborted = true;
            state.error = Some(message);
        }
    }
}

/// Drives renewal of one scoped execution's locks in the background.
pub struct Scheduler {
    signal: CancellationSignal,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the cooperative timer. `ttl_ms` determines the renewal cadence
    /// (80% of TTL, floored at [`MIN_EXTENSION_INTERVAL_MS`]); the renewer
    /// itself decides what "too late" means per-call.
    pub fn start(renewer: Arc<dyn Renewer>, ttl_ms: i64) -> Self {
        let signal = CancellationSignal::new();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let loop_signal = signal.clone();
        let interval = renewal_interval(ttl_ms);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => return,
                    () = tokio::time::sleep(interval) => {}
                }

                match renewer.renew().await {
                    Ok(true) => debug!("lock renewal succeeded"),
                    Ok(false) => {
                        warn!("lock renewal failed, aborting scoped execution");
                        loop_signal.publish("lock renewal failed".to_string()).await;
                        return;
                    }
                    Err(err) => {
                        warn!(error = %err, "lock renewal errored, aborting scoped execution");
                        loop_signal.publish(format!("lock renewal error: {err}")).await;
                        return;
                    }
                }
            }
        });

        Self {
            signal,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// A clone of the signal this scheduler publishes to.
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        self.signal.clone()
    }

    /// Stop the scheduler and wait for its task to exit. Idempotent: safe to
    /// call after the scheduler already terminated itself on renewal
    /// failure. Any pending sleep is cancelled, never left to outlive the
    /// process.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRenewer {
        calls: Arc<AtomicUsize>,
        succeed: bool,
    }

    #[async_trait]
    impl Renewer for CountingRenewer {
        async fn renew(&self) -> Result<bool, LockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.succeed)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn renews_repeatedly_until_stopped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let renewer = Arc::new(CountingRenewer { calls: calls.clone(), succeed: true });
        let scheduler = Scheduler::start(renewer, 1_000);

        tokio::time::advance(Duration::from_millis(2_500)).await;
        tokio::task::yield_now().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert!(!scheduler.signal().aborted().await);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_failure_exactly_once_on_renewal_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let renewer = Arc::new(CountingRenewer { calls: calls.clone(), succeed: false });
        let scheduler = Scheduler::start(renewer, 1_000);
        let signal = scheduler.signal();

        tokio::time::advance(Duration::from_millis(900)).await;
        tokio::task::yield_now().await;

        assert!(signal.aborted().await);
        assert_eq!(signal.error().await.as_deref(), Some("lock renewal failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no further renewal after failure");

        scheduler.stop().await;
    }

    #[test]
    fn min_remaining_ttl_applies_safety_floor() {
        assert_eq!(min_remaining_ttl_ms(30_000, SINGLE_NODE_BUFFER_RATIO), 3_000);
        assert_eq!(min_remaining_ttl_ms(1_000, SINGLE_NODE_BUFFER_RATIO), SAFETY_BUFFER_MS);
    }
}
