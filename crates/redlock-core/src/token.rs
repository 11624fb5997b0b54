//! Fencing-token generation.
//!
//! The token is the `value` stored at the lock key: proof of ownership on
//! release/extend, and (optionally) a fence passed to downstream resources.
//! It must come from a cryptographically strong source with at least 16
//! bytes of entropy; two concurrent acquires must never collide.

use rand::RngCore;

/// Number of random bytes backing each minted token (128 bits of entropy,
/// comfortably above the 16-byte floor).
const TOKEN_BYTES: usize = 16;

/// Mint a fresh fencing token: `TOKEN_BYTES` bytes from the OS CSPRNG,
/// hex-encoded into a 32-character printable string.
#[must_use]
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_bounded_printable_string() {
        let t = generate();
        assert_eq!(t.len(), TOKEN_BYTES * 2);
        assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn concurrent_generates_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate()), "fencing token collision");
        }
    }
}
