//! Backend-agnostic conformance suite for [`crate::adapter::StoreAdapter`]
//! implementations.
//!
//! Call [`run_adapter_conformance_tests`] from your backend's own test module
//! with a fresh adapter instance bound to an isolated key prefix, mirroring
//! how each `acteon-state-*` backend re-runs the shared lock/store
//! conformance suite against its own connection.

use std::time::Duration;

use crate::adapter::{ExtendResultCode, StoreAdapter};
use crate::error::LockError;

fn unique_key(label: &str) -> String {
    format!("conformance:{label}:{}", crate::token::generate())
}

/// Run the full adapter conformance suite.
///
/// # Errors
///
/// Returns an error if any conformance assertion fails.
pub async fn run_adapter_conformance_tests(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    test_set_if_absent_then_blocked(adapter).await?;
    test_owner_only_delete(adapter).await?;
    test_owner_only_extend(adapter).await?;
    test_atomic_extend_feedback_contract(adapter).await?;
    test_round_trip(adapter).await?;
    test_batch_all_or_nothing(adapter).await?;
    test_inspect(adapter).await?;
    Ok(())
}

async fn test_set_if_absent_then_blocked(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let key = unique_key("sia");
    let set = adapter.set_if_absent(&key, "v1", 10_000).await?;
    assert!(set, "first set_if_absent should succeed");

    let blocked = adapter.set_if_absent(&key, "v2", 10_000).await?;
    assert!(!blocked, "set_if_absent on a held key should fail");

    let val = adapter.get(&key).await?;
    assert_eq!(val.as_deref(), Some("v1"), "original value should remain");
    Ok(())
}

async fn test_owner_only_delete(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let key = unique_key("del");
    adapter.set_if_absent(&key, "owner", 10_000).await?;

    let deleted = adapter.delete_if_match(&key, "impostor").await?;
    assert!(!deleted, "delete_if_match with the wrong value must not delete");
    assert!(adapter.get(&key).await?.is_some(), "key must remain");

    let deleted = adapter.delete_if_match(&key, "owner").await?;
    assert!(deleted, "delete_if_match with the right value must delete");
    assert!(adapter.get(&key).await?.is_none());
    Ok(())
}

async fn test_owner_only_extend(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let key = unique_key("ext");
    adapter.set_if_absent(&key, "owner", 2_000).await?;

    let extended = adapter.extend_if_match(&key, "impostor", 60_000).await?;
    assert!(!extended, "extend_if_match with the wrong value must not extend");

    let extended = adapter.extend_if_match(&key, "owner", 60_000).await?;
    assert!(extended, "extend_if_match with the right value must extend");

    let inspected = adapter.inspect(&key).await?.expect("key should still exist");
    assert!(
        inspected.ttl_ms > 2_000,
        "ttl should reflect the extension, got {}",
        inspected.ttl_ms
    );
    Ok(())
}

async fn test_atomic_extend_feedback_contract(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    // Absent key: {-1, -2}.
    let missing_key = unique_key("missing");
    let result = adapter.atomic_extend(&missing_key, "v", 1_000, 30_000).await?;
    assert_eq!(result.result_code, ExtendResultCode::MismatchOrMissing);
    assert_eq!(result.actual_ttl_ms, -2);

    // Too-late: remaining ttl below minimum.
    let too_late_key = unique_key("too-late");
    adapter.set_if_absent(&too_late_key, "v", 500).await?;
    let result = adapter
        .atomic_extend(&too_late_key, "v", 2_000, 30_000)
        .await?;
    assert_eq!(result.result_code, ExtendResultCode::TooLate);
    assert!(result.actual_ttl_ms > 0 && result.actual_ttl_ms <= 500);

    // Value mismatch: held by another owner.
    let stolen_key = unique_key("stolen");
    adapter.set_if_absent(&stolen_key, "owner", 30_000).await?;
    let result = adapter
        .atomic_extend(&stolen_key, "impostor", 1_000, 30_000)
        .await?;
    assert_eq!(result.result_code, ExtendResultCode::MismatchOrMissing);
    assert!(result.actual_ttl_ms >= 0);

    // Success.
    let ok_key = unique_key("ok");
    adapter.set_if_absent(&ok_key, "owner", 30_000).await?;
    let result = adapter
        .atomic_extend(&ok_key, "owner", 1_000, 60_000)
        .await?;
    assert!(result.succeeded());
    let inspected = adapter.inspect(&ok_key).await?.expect("should exist");
    assert!(inspected.ttl_ms > 30_000, "ttl should reflect the new value");

    Ok(())
}

async fn test_round_trip(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let key = unique_key("round-trip");
    adapter.set_if_absent(&key, "owner", 10_000).await?;
    let released = adapter.delete_if_match(&key, "owner").await?;
    assert!(released);
    assert!(adapter.get(&key).await?.is_none());
    Ok(())
}

async fn test_batch_all_or_nothing(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let a = unique_key("batch-a");
    let b = unique_key("batch-b");
    let c = unique_key("batch-c");

    // Pre-seed b so the batch must fail.
    adapter.set_if_absent(&b, "preexisting", 10_000).await?;

    let keys = vec![a.clone(), b.clone(), c.clone()];
    let values = vec!["va".to_string(), "vb".to_string(), "vc".to_string()];
    let result = adapter.batch_set_if_absent(&keys, &values, 10_000).await?;

    match result {
        crate::adapter::BatchAcquireResult::Failure {
            failed_index,
            failed_key,
        } => {
            assert_eq!(failed_index, 2, "1-based index of the conflicting key");
            assert_eq!(failed_key, b);
        }
        crate::adapter::BatchAcquireResult::Success { .. } => {
            panic!("expected batch failure due to pre-seeded key");
        }
    }

    assert!(adapter.get(&a).await?.is_none(), "a must not be set after a failed batch");
    assert!(adapter.get(&c).await?.is_none(), "c must not be set after a failed batch");
    adapter.delete(&b).await?;

    // Now a clean batch of distinct keys should succeed entirely.
    let keys = vec![a.clone(), b.clone(), c.clone()];
    let result = adapter.batch_set_if_absent(&keys, &values, 10_000).await?;
    assert_eq!(
        result,
        crate::adapter::BatchAcquireResult::Success { acquired_count: 3 }
    );
    for (k, v) in keys.iter().zip(values.iter()) {
        assert_eq!(adapter.get(k).await?.as_deref(), Some(v.as_str()));
    }
    Ok(())
}

async fn test_inspect(adapter: &dyn StoreAdapter) -> Result<(), LockError> {
    let key = unique_key("inspect");
    assert!(adapter.inspect(&key).await?.is_none());

    adapter.set_if_absent(&key, "owner", 5_000).await?;
    let inspected = adapter.inspect(&key).await?.expect("should exist");
    assert_eq!(inspected.value, "owner");
    assert!(inspected.ttl_ms > 0 && inspected.ttl_ms <= 5_000);
    Ok(())
}

/// Sleep helper used by conformance tests that need to observe a genuine TTL
/// expiry rather than a too-late atomic-extend branch.
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
