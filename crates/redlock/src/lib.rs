//! Distributed mutual-exclusion service: single-node lock, quorum lock
//! (Redlock), auto-extension scheduler, scoped executor, and batch manager.
//!
//! This crate implements the lock-level protocols on top of a pluggable
//! [`StoreAdapter`](redlock_core::StoreAdapter); `redlock-redis` and
//! `redlock-memory` supply concrete backends. [`SingleNodeLock`] is the fast
//! path against one adapter; [`QuorumLock`] runs the Redlock algorithm across
//! N independent adapters. Both expose `using(routine)`, a scoped-execution
//! wrapper that auto-extends the held lock via [`scheduler::Scheduler`] while
//! `routine` runs and guarantees release on every exit path. [`BatchManager`]
//! adds atomic multi-key acquisition with the same scoped-execution support.

pub mod batch;
pub mod config;
pub mod managed;
pub mod quorum;
pub mod scheduler;
pub mod scoped;
pub mod single;

pub use batch::BatchManager;
pub use config::{BatchManagerConfig, QuorumLockConfig, SingleNodeLockConfig};
pub use managed::ManagedLock;
pub use quorum::QuorumLock;
pub use scheduler::{CancellationSignal, Renewer, Scheduler};
pub use single::SingleNodeLock;

pub use redlock_core::{
    AcquireMetadata, AtomicExtendResult, BatchAcquireResult, ExtendResultCode, LockError,
    LockHandle, LockInspection, Strategy, StoreAdapter,
};
