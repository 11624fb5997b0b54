use std::time::Duration;

use thiserror::Error;

/// Public error taxonomy for every lock operation.
///
/// Validation and configuration errors are raised synchronously and never
/// retried. Transient store errors are recovered locally where the calling
/// layer specifies (retry loop, script reload); anything else propagates as
/// one of the remaining variants.
#[derive(Debug, Error)]
pub enum LockError {
    /// Bad argument (key, value, TTL, array length, quorum out of range). No
    /// store I/O has occurred.
    #[error("validation error: {0}")]
    Validation(String),

    /// `acquire` exhausted its configured attempts.
    #[error("lock unavailable after {attempts} attempt(s){}", format_cause(last_cause))]
    Unavailable {
        attempts: u32,
        last_cause: Option<String>,
    },

    /// Transport or store failure while attempting release.
    #[error("lock release failed: {0}")]
    Release(String),

    /// Transport or store failure while attempting extend.
    #[error("lock extension failed: {0}")]
    Extension(String),

    /// A single store call exceeded its per-call deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Construction-time invariants violated (no adapters, quorum out of
    /// range, negative TTL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Script load or evaluation failed in a way not covered by the other
    /// variants (for example `NOSCRIPT` surviving one reload).
    #[error("adapter error: {0}")]
    Adapter(String),
}

fn format_cause(cause: &Option<String>) -> String {
    match cause {
        Some(c) => format!(": {c}"),
        None => String::new(),
    }
}

impl LockError {
    /// True if this error kind reflects exhaustion of the acquire retry loop.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LockError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_formats_cause_when_present() {
        let err = LockError::Unavailable {
            attempts: 3,
            last_cause: Some("timeout".into()),
        };
        assert_eq!(err.to_string(), "lock unavailable after 3 attempt(s): timeout");
    }

    #[test]
    fn unavailable_formats_without_cause() {
        let err = LockError::Unavailable {
            attempts: 1,
            last_cause: None,
        };
        assert_eq!(err.to_string(), "lock unavailable after 1 attempt(s)");
    }

    #[test]
    fn is_unavailable_discriminates_variant() {
        assert!(LockError::Unavailable { attempts: 1, last_cause: None }.is_unavailable());
        assert!(!LockError::Validation("bad key".into()).is_unavailable());
    }
}
