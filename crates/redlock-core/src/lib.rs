//! Trait abstractions, Lua scripts, error taxonomy, and fencing-token
//! generation shared by every backend of the Redlock distributed-lock
//! service.
//!
//! This crate defines [`StoreAdapter`], the narrow capability a store
//! backend implements (`redlock-redis`, `redlock-memory`), plus the value
//! types that flow across it ([`AtomicExtendResult`], [`BatchAcquireResult`],
//! [`LockInspection`]) and the handle type ([`LockHandle`]) minted by the
//! lock implementations in the `redlock` crate.

pub mod adapter;
pub mod error;
pub mod handle;
pub mod scripts;
pub mod testing;
pub mod token;
pub mod validate;

pub use adapter::{AtomicExtendResult, BatchAcquireResult, ExtendResultCode, LockInspection, StoreAdapter};
pub use error::LockError;
pub use handle::{AcquireMetadata, LockHandle, Strategy};
