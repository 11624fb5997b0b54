//! Argument validation shared by every [`crate::adapter::StoreAdapter`]
//! implementation. Violations fail before any store I/O occurs.

use crate::error::LockError;

pub const MAX_KEY_LEN: usize = 512;
pub const MAX_VALUE_LEN: usize = 1024;
pub const MAX_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Validate a lock key: non-empty, `<= 512` chars, no CR/LF.
pub fn key(key: &str) -> Result<(), LockError> {
    if key.is_empty() {
        return Err(LockError::Validation("key must not be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(LockError::Validation(format!(
            "key length {} exceeds maximum of {MAX_KEY_LEN}",
            key.len()
        )));
    }
    if key.contains('\r') || key.contains('\n') {
        return Err(LockError::Validation("key must not contain CR/LF".into()));
    }
    Ok(())
}

/// Validate a fencing-token value: non-empty, `<= 1024` chars.
pub fn value(value: &str) -> Result<(), LockError> {
    if value.is_empty() {
        return Err(LockError::Validation("value must not be empty".into()));
    }
    if value.len() > MAX_VALUE_LEN {
        return Err(LockError::Validation(format!(
            "value length {} exceeds maximum of {MAX_VALUE_LEN}",
            value.len()
        )));
    }
    Ok(())
}

/// Validate a TTL in milliseconds: positive, `<= 24h`.
pub fn ttl_ms(ttl_ms: i64) -> Result<(), LockError> {
    if ttl_ms <= 0 {
        return Err(LockError::Validation("ttl must be positive".into()));
    }
    if ttl_ms > MAX_TTL_MS {
        return Err(LockError::Validation(format!(
            "ttl {ttl_ms}ms exceeds maximum of {MAX_TTL_MS}ms (24h)"
        )));
    }
    Ok(())
}

/// Validate a batch call's key/value arrays: equal length, non-empty, and
/// every individual key/value valid.
pub fn batch(keys: &[String], values: &[String]) -> Result<(), LockError> {
    if keys.is_empty() || values.is_empty() {
        return Err(LockError::Validation(
            "batch keys/values must not be empty".into(),
        ));
    }
    if keys.len() != values.len() {
        return Err(LockError::Validation(format!(
            "batch keys length {} does not match values length {}",
            keys.len(),
            values.len()
        )));
    }
    for k in keys {
        self::key(k)?;
    }
    for v in values {
        self::value(v)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_rejects_empty() {
        assert!(key("").is_err());
    }

    #[test]
    fn key_rejects_too_long() {
        let long = "a".repeat(MAX_KEY_LEN + 1);
        assert!(key(&long).is_err());
    }

    #[test]
    fn key_rejects_crlf() {
        assert!(key("a\r\nb").is_err());
        assert!(key("a\nb").is_err());
    }

    #[test]
    fn key_accepts_valid() {
        assert!(key("lock:my-resource").is_ok());
    }

    #[test]
    fn value_rejects_empty_and_too_long() {
        assert!(value("").is_err());
        assert!(value(&"v".repeat(MAX_VALUE_LEN + 1)).is_err());
        assert!(value("token-123").is_ok());
    }

    #[test]
    fn ttl_rejects_non_positive_and_too_large() {
        assert!(ttl_ms(0).is_err());
        assert!(ttl_ms(-1).is_err());
        assert!(ttl_ms(MAX_TTL_MS + 1).is_err());
        assert!(ttl_ms(30_000).is_ok());
    }

    #[test]
    fn batch_rejects_empty_and_mismatched_lengths() {
        assert!(batch(&[], &[]).is_err());
        assert!(batch(&["a".into()], &["v1".into(), "v2".into()]).is_err());
        assert!(batch(&["a".into(), "b".into()], &["v1".into(), "v2".into()]).is_ok());
    }

    #[test]
    fn batch_rejects_invalid_element() {
        let keys = vec!["ok".to_string(), String::new()];
        let values = vec!["v1".to_string(), "v2".to_string()];
        assert!(batch(&keys, &values).is_err());
    }
}
